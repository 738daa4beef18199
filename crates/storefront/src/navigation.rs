//! Navigation intents produced by commands.
//!
//! The library never routes; it tells the front end where to go next.

use std::fmt;

use url::Url;

use tshop_core::{CategoryId, OrderId, ProductId};

/// A destination the front end should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Shop,
    Login,
    ForgotPassword,
    /// Enter the e-mailed verification code for this address.
    VerifyCode { email: String },
    Cart,
    Product(ProductId),
    Category(CategoryId),
    Profile,
    Orders,
    Order(OrderId),
    /// Leave the storefront, e.g. for the payment provider's checkout page.
    External(Url),
}

impl Route {
    /// Whether this route is only reachable with a session.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Cart | Self::Profile | Self::Orders | Self::Order(_)
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Shop => f.write_str("/shop"),
            Self::Login => f.write_str("/login"),
            Self::ForgotPassword | Self::VerifyCode { .. } => f.write_str("/forgot-password"),
            Self::Cart => f.write_str("/cart"),
            Self::Product(id) => write!(f, "/product/{id}"),
            Self::Category(id) => write!(f, "/categories/{id}/products"),
            Self::Profile => f.write_str("/profile"),
            Self::Orders => f.write_str("/profile/orders"),
            Self::Order(id) => write!(f, "/profile/orders/{id}"),
            Self::External(url) => f.write_str(url.as_str()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_routes() {
        assert!(Route::Profile.requires_login());
        assert!(Route::Order(OrderId::new(3)).requires_login());
        assert!(!Route::Shop.requires_login());
        assert!(!Route::Product(ProductId::new(1)).requires_login());
    }

    #[test]
    fn test_display_paths() {
        assert_eq!(Route::Home.to_string(), "/");
        assert_eq!(Route::Category(CategoryId::new(4)).to_string(), "/categories/4/products");
        assert_eq!(Route::Order(OrderId::new(2)).to_string(), "/profile/orders/2");
        let url = Url::parse("https://pay.example/s/1").unwrap();
        assert_eq!(Route::External(url).to_string(), "https://pay.example/s/1");
    }
}
