//! Form input and its local validation.
//!
//! Validation runs before a command touches the network. The API validates
//! again; these checks only catch what could never succeed.

use std::fmt;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};

use tshop_core::Email;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Largest quantity a single add-to-cart may carry.
pub const MAX_ADD_QUANTITY: u32 = 10;

/// Length of the e-mailed verification code.
pub const VERIFICATION_CODE_LENGTH: usize = 6;

// =============================================================================
// FieldErrors
// =============================================================================

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in a form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// First message recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if let Err(e) = Email::parse(email) {
        errors.push("email", e.to_string());
    }
}

fn check_required(errors: &mut FieldErrors, field: &'static str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.push(field, format!("{label} is required"));
    }
}

fn check_min_length(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    label: &str,
    min: usize,
) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(field, format!("{label} is required"));
    } else if value.chars().count() < min {
        errors.push(field, format!("Must be at least {min} characters"));
    }
}

// =============================================================================
// Forms
// =============================================================================

/// `POST /Account/login` input.
#[derive(Debug)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

impl LoginForm {
    /// # Errors
    ///
    /// Returns the rejected fields.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_email(&mut errors, &self.email);
        check_required(&mut errors, "password", self.password.expose_secret(), "Password");
        errors.into_result()
    }
}

/// `POST /Account/register` input.
#[derive(Debug)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub birth_date: NaiveDate,
}

impl RegisterForm {
    /// Validate against today's date.
    ///
    /// # Errors
    ///
    /// Returns the rejected fields.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        self.validate_on(chrono::Utc::now().date_naive())
    }

    /// Validate as if today were `today`.
    ///
    /// # Errors
    ///
    /// Returns the rejected fields.
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_min_length(&mut errors, "first_name", &self.first_name, "First name", 2);
        check_min_length(&mut errors, "last_name", &self.last_name, "Last name", 2);
        check_min_length(&mut errors, "user_name", &self.user_name, "Username", 4);
        check_email(&mut errors, &self.email);

        let password = self.password.expose_secret();
        if password.is_empty() {
            errors.push("password", "Password is required");
        } else if password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(
                "password",
                format!("Must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        }
        if self.confirm_password.expose_secret() != password {
            errors.push("confirm_password", "Passwords do not match");
        }
        if self.birth_date > today {
            errors.push("birth_date", "Date of birth cannot be in the future");
        }
        errors.into_result()
    }
}

/// `POST /Auth/change-password` input.
#[derive(Debug)]
pub struct ChangePasswordForm {
    pub old_password: SecretString,
    pub new_password: SecretString,
    pub confirm_password: SecretString,
}

impl ChangePasswordForm {
    /// # Errors
    ///
    /// Returns the rejected fields.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        let new_password = self.new_password.expose_secret();
        check_required(&mut errors, "old_password", self.old_password.expose_secret(), "Current password");
        check_required(&mut errors, "new_password", new_password, "New password");
        check_required(
            &mut errors,
            "confirm_password",
            self.confirm_password.expose_secret(),
            "Password confirmation",
        );
        if self.confirm_password.expose_secret() != new_password {
            errors.push("confirm_password", "New passwords do not match.");
        }
        errors.into_result()
    }
}

/// `POST /Account/VerifyCode` input.
#[derive(Debug, Clone)]
pub struct VerifyCodeForm {
    pub email: String,
    pub code: String,
}

impl VerifyCodeForm {
    /// # Errors
    ///
    /// Returns the rejected fields.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_email(&mut errors, &self.email);
        let code = self.code.trim();
        if code.len() != VERIFICATION_CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(
                "code",
                format!("Enter the {VERIFICATION_CODE_LENGTH}-digit code"),
            );
        }
        errors.into_result()
    }
}

/// Review of a product.
#[derive(Debug, Clone)]
pub struct ReviewForm {
    pub rate: u8,
    pub comment: String,
}

impl ReviewForm {
    /// # Errors
    ///
    /// Returns the rejected fields.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if !(1..=5).contains(&self.rate) {
            errors.push("rate", "Rating must be between 1 and 5");
        }
        errors.into_result()
    }
}

/// Quantity chosen on a product page.
///
/// # Errors
///
/// Returns a `quantity` error outside `1..=MAX_ADD_QUANTITY`.
pub fn validate_add_quantity(quantity: u32) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if !(1..=MAX_ADD_QUANTITY).contains(&quantity) {
        errors.push(
            "quantity",
            format!("Quantity must be between 1 and {MAX_ADD_QUANTITY}"),
        );
    }
    errors.into_result()
}

/// Validate an e-mail entered on its own (forgot-password, resend code).
///
/// # Errors
///
/// Returns an `email` error if the address cannot be parsed.
pub fn validate_email(email: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    check_email(&mut errors, email);
    errors.into_result()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    fn register() -> RegisterForm {
        RegisterForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            user_name: "ada_l".to_string(),
            email: "ada@example.com".to_string(),
            password: secret("analytical"),
            confirm_password: secret("analytical"),
            birth_date: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_login_form() {
        let ok = LoginForm {
            email: " shopper@example.com ".to_string(),
            password: secret("pw"),
        };
        assert!(ok.validate().is_ok());

        let bad = LoginForm {
            email: "shopper".to_string(),
            password: secret(""),
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.get("email").is_some());
        assert_eq!(errors.get("password"), Some("Password is required"));
    }

    #[test]
    fn test_register_form_accepts_valid_input() {
        assert!(register().validate_on(today()).is_ok());
    }

    #[test]
    fn test_register_form_collects_every_problem() {
        let form = RegisterForm {
            first_name: "A".to_string(),
            user_name: String::new(),
            password: secret("short"),
            confirm_password: secret("shorter"),
            birth_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            ..register()
        };
        let errors = form.validate_on(today()).unwrap_err();

        assert_eq!(errors.get("first_name"), Some("Must be at least 2 characters"));
        assert_eq!(errors.get("user_name"), Some("Username is required"));
        assert_eq!(errors.get("password"), Some("Must be at least 6 characters"));
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
        assert!(errors.get("birth_date").is_some());
        assert!(errors.get("last_name").is_none());
    }

    #[test]
    fn test_change_password_mismatch() {
        let form = ChangePasswordForm {
            old_password: secret("old-one"),
            new_password: secret("new-one"),
            confirm_password: secret("new-two"),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("confirm_password"), Some("New passwords do not match."));
    }

    #[test]
    fn test_verify_code_must_be_six_digits() {
        let form = |code: &str| VerifyCodeForm {
            email: "a@b.co".to_string(),
            code: code.to_string(),
        };
        assert!(form("123456").validate().is_ok());
        assert!(form("12345").validate().is_err());
        assert!(form("12345a").validate().is_err());
        assert!(form("١٢٣٤٥٦").validate().is_err());
    }

    #[test]
    fn test_review_rate_bounds() {
        let review = |rate| ReviewForm {
            rate,
            comment: String::new(),
        };
        assert!(review(1).validate().is_ok());
        assert!(review(5).validate().is_ok());
        assert!(review(0).validate().is_err());
        assert!(review(6).validate().is_err());
    }

    #[test]
    fn test_add_quantity_bounds() {
        assert!(validate_add_quantity(1).is_ok());
        assert!(validate_add_quantity(MAX_ADD_QUANTITY).is_ok());
        assert!(validate_add_quantity(0).is_err());
        assert!(validate_add_quantity(MAX_ADD_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_display_joins_fields() {
        let errors = validate_email("").unwrap_err();
        assert_eq!(errors.to_string(), "email: email is required");
    }
}
