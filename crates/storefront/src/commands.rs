//! Mutation commands.
//!
//! Each command validates its input, issues exactly one request, and on
//! success applies its side effects: notifications, query invalidation, and a
//! navigation intent for the front end. On failure the error has already been
//! shown to the user; the caller gets it back for control flow only.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};
use url::Url;

use tshop_core::{ProductId, Role};

use crate::api::types::{
    ChangePasswordRequest, EmailRequest, LoginRequest, LoginResponse, RegisterRequest,
    VerifyCodeRequest,
};
use crate::api::{
    AddToCartRequest, ApiError, CheckoutRequest, CheckoutResponse, PaymentMethod, ReviewInput,
};
use crate::error::Result;
use crate::forms::{self, ChangePasswordForm, LoginForm, RegisterForm, ReviewForm, VerifyCodeForm};
use crate::navigation::Route;
use crate::query::QueryKey;
use crate::state::Storefront;

pub const LOGIN_SUCCESS_MESSAGE: &str = "You have successfully logged in!";
pub const LOGOUT_MESSAGE: &str = "Logged out successfully!";
pub const REGISTERED_MESSAGE: &str = "Account created successfully!";
pub const CODE_SENT_MESSAGE: &str = "A verification code has been sent to your email.";
pub const CODE_RESENT_MESSAGE: &str = "A new code has been sent successfully.";
pub const VERIFIED_MESSAGE: &str = "Verified successfully!";
pub const PASSWORD_CHANGED_MESSAGE: &str = "Password changed successfully!";
pub const ADDED_TO_CART_MESSAGE: &str = "Product added to cart successfully ✅";
pub const REMOVED_FROM_CART_MESSAGE: &str = "Item removed from cart 🗑️";
pub const CART_CLEARED_MESSAGE: &str = "Your cart has been cleared!";
pub const REDIRECTING_MESSAGE: &str = "Redirecting to payment page...";
pub const PAYMENT_URL_MISSING_MESSAGE: &str = "Payment URL not found";
pub const REVIEW_ADDED_MESSAGE: &str = "Review added successfully!";

/// Direction of a server-side quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountChange {
    Increase,
    Decrease,
}

impl Storefront {
    // =========================================================================
    // Account
    // =========================================================================

    /// Log in and remember the issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid or the API rejects the login.
    #[instrument(skip(self, form))]
    pub async fn login(&self, form: &LoginForm) -> Result<Route> {
        form.validate()?;

        let body = LoginRequest {
            email: form.email.trim(),
            password: form.password.expose_secret(),
        };
        let response: LoginResponse = self
            .api()
            .send(Method::POST, "Account/login", Some(&body))
            .await?;

        if response.token.trim().is_empty() {
            let err = ApiError::Unexpected("Login response did not include a token".to_string());
            self.api().surface(&err);
            return Err(err.into());
        }

        let role = response
            .role
            .filter(|r| !r.trim().is_empty())
            .map(Role::new);
        self.session()
            .on_login_success(SecretString::from(response.token), role);

        // Anything cached belonged to the previous identity
        self.queries().invalidate_all();
        self.notifier().success(LOGIN_SUCCESS_MESSAGE);
        Ok(Route::Home)
    }

    /// Forget the session. Never touches the network.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Route {
        self.session().on_logout();
        self.queries().invalidate_all();
        self.notifier().success(LOGOUT_MESSAGE);
        Route::Home
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid or the API rejects it.
    #[instrument(skip(self, form))]
    pub async fn register(&self, form: &RegisterForm) -> Result<()> {
        form.validate()?;

        let body = RegisterRequest {
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            user_name: form.user_name.trim(),
            email: form.email.trim(),
            password: form.password.expose_secret(),
            confirm_password: form.confirm_password.expose_secret(),
            birth_of_date: form.birth_date,
        };
        self.api()
            .send_ignoring_body(Method::POST, "Account/register", Some(&body))
            .await?;

        info!("Account registered");
        self.notifier().success(REGISTERED_MESSAGE);
        Ok(())
    }

    /// Start a password reset; the API e-mails a code.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the API rejects it.
    #[instrument(skip(self, email))]
    pub async fn forgot_password(&self, email: &str) -> Result<Route> {
        forms::validate_email(email)?;
        let email = email.trim();

        self.api()
            .send_ignoring_body(
                Method::POST,
                "Account/ForgotPassword",
                Some(&EmailRequest { email }),
            )
            .await?;

        self.notifier().success(CODE_SENT_MESSAGE);
        Ok(Route::VerifyCode {
            email: email.to_string(),
        })
    }

    /// Ask for a fresh verification code.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the API rejects it.
    #[instrument(skip(self, email))]
    pub async fn send_code(&self, email: &str) -> Result<()> {
        forms::validate_email(email)?;

        self.api()
            .send_ignoring_body(
                Method::POST,
                "Account/SendCode",
                Some(&EmailRequest {
                    email: email.trim(),
                }),
            )
            .await?;

        self.notifier().success(CODE_RESENT_MESSAGE);
        Ok(())
    }

    /// Confirm the e-mailed code.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid or the code is rejected.
    #[instrument(skip(self, form))]
    pub async fn verify_code(&self, form: &VerifyCodeForm) -> Result<Route> {
        form.validate()?;

        let body = VerifyCodeRequest {
            email: form.email.trim(),
            code: form.code.trim(),
        };
        self.api()
            .send_ignoring_body(Method::POST, "Account/VerifyCode", Some(&body))
            .await?;

        self.notifier().success(VERIFIED_MESSAGE);
        Ok(Route::Login)
    }

    /// Change the logged-in user's password.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid or the API rejects it.
    #[instrument(skip(self, form))]
    pub async fn change_password(&self, form: &ChangePasswordForm) -> Result<()> {
        form.validate()?;

        let body = ChangePasswordRequest {
            old_password: form.old_password.expose_secret(),
            new_password: form.new_password.expose_secret(),
            confirm_password: form.confirm_password.expose_secret(),
        };
        self.api()
            .send_ignoring_body(Method::POST, "Auth/change-password", Some(&body))
            .await?;

        self.queries().invalidate(QueryKey::UserInfo).await;
        self.notifier().success(PASSWORD_CHANGED_MESSAGE);
        Ok(())
    }

    // =========================================================================
    // Server-side cart
    // =========================================================================

    /// Add `quantity` units of a product to the server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is out of range or the request fails.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        forms::validate_add_quantity(quantity)?;

        self.api()
            .send_ignoring_body(
                Method::POST,
                &format!("Carts/{product_id}"),
                Some(&AddToCartRequest { count: quantity }),
            )
            .await?;

        self.queries().invalidate(QueryKey::Cart).await;
        self.notifier().success(ADDED_TO_CART_MESSAGE);
        Ok(())
    }

    /// Add one unit to a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn increase_quantity(&self, product_id: ProductId) -> Result<()> {
        self.change_count(product_id, CountChange::Increase).await
    }

    /// Remove one unit from a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn decrease_quantity(&self, product_id: ProductId) -> Result<()> {
        self.change_count(product_id, CountChange::Decrease).await
    }

    #[instrument(skip(self))]
    async fn change_count(&self, product_id: ProductId, change: CountChange) -> Result<()> {
        let path = match change {
            CountChange::Increase => format!("Carts/increaseCount/{product_id}"),
            CountChange::Decrease => format!("Carts/decreaseCount/{product_id}"),
        };
        self.api()
            .send_ignoring_body::<()>(Method::PATCH, &path, None)
            .await?;

        self.queries().invalidate(QueryKey::Cart).await;
        Ok(())
    }

    /// Delete a line from the server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product_id: ProductId) -> Result<()> {
        self.api()
            .send_ignoring_body::<()>(Method::DELETE, &format!("Carts/{product_id}"), None)
            .await?;

        self.queries().invalidate(QueryKey::Cart).await;
        self.notifier().success(REMOVED_FROM_CART_MESSAGE);
        Ok(())
    }

    /// Empty the server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        self.api()
            .send_ignoring_body::<()>(Method::DELETE, "Carts/clearCart", None)
            .await?;

        self.queries().invalidate(QueryKey::Cart).await;
        self.notifier().success(CART_CLEARED_MESSAGE);
        Ok(())
    }

    /// Start payment for the server-side cart.
    ///
    /// Yields the payment provider's page as an external route.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response lacks a usable
    /// payment URL.
    #[instrument(skip(self))]
    pub async fn checkout(&self, payment_method: PaymentMethod) -> Result<Route> {
        let response: Option<CheckoutResponse> = self
            .api()
            .send(
                Method::POST,
                "CheckOuts/Pay",
                Some(&CheckoutRequest { payment_method }),
            )
            .await?;

        // The order exists server-side now, whatever the response looks like
        self.queries().invalidate(QueryKey::Cart).await;
        self.queries().invalidate(QueryKey::Orders).await;

        let Some(url) = response
            .as_ref()
            .and_then(CheckoutResponse::payment_url)
            .and_then(|raw| match Url::parse(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, url = raw, "Unparseable payment URL");
                    None
                }
            })
        else {
            warn!("Payment URL missing in checkout response");
            let err = ApiError::Unexpected(PAYMENT_URL_MISSING_MESSAGE.to_string());
            self.api().surface(&err);
            return Err(err.into());
        };

        self.notifier().info(REDIRECTING_MESSAGE);
        Ok(Route::External(url))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Post a review for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid or the API rejects it.
    #[instrument(skip(self, form))]
    pub async fn submit_review(&self, product_id: ProductId, form: &ReviewForm) -> Result<()> {
        form.validate()?;

        let body = ReviewInput {
            rate: form.rate,
            comment: form.comment.trim().to_string(),
        };
        self.api()
            .send_ignoring_body(
                Method::POST,
                &format!("products/{product_id}/Reviews/Create"),
                Some(&body),
            )
            .await?;

        self.queries().invalidate(QueryKey::Product(product_id)).await;
        self.notifier().success(REVIEW_ADDED_MESSAGE);
        Ok(())
    }
}
