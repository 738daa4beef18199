//! Account and session commands.
//!
//! # Usage
//!
//! ```bash
//! # Log in (password may also come from TSHOP_PASSWORD)
//! tshop login -e shopper@example.com -p secret
//!
//! # Reset a forgotten password
//! tshop forgot-password shopper@example.com
//! tshop verify-code shopper@example.com 123456
//! ```

use std::io::Write;

use chrono::NaiveDate;
use secrecy::SecretString;

use tshop_storefront::Storefront;
use tshop_storefront::forms::{ChangePasswordForm, LoginForm, RegisterForm, VerifyCodeForm};

use super::CliError;

pub async fn login(
    storefront: &Storefront,
    out: &mut impl Write,
    email: String,
    password: String,
) -> Result<(), CliError> {
    let form = LoginForm {
        email,
        password: SecretString::from(password),
    };
    let route = storefront.login(&form).await?;
    tracing::debug!(%route, "Logged in");
    whoami(storefront, out)
}

pub fn logout(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    storefront.logout();
    whoami(storefront, out)
}

/// Print the session state.
pub fn whoami(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let state = storefront.session_state();
    if !state.is_logged_in {
        writeln!(out, "Not logged in.")?;
    } else if state.is_admin {
        writeln!(out, "Logged in (admin).")?;
    } else {
        writeln!(out, "Logged in.")?;
    }
    Ok(())
}

/// Assemble a registration form from command-line arguments.
///
/// A missing confirmation repeats the password.
pub fn register_form(
    first_name: String,
    last_name: String,
    user_name: String,
    email: String,
    password: String,
    confirm_password: Option<String>,
    birth_date: NaiveDate,
) -> RegisterForm {
    let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
    RegisterForm {
        first_name,
        last_name,
        user_name,
        email,
        password: SecretString::from(password),
        confirm_password: SecretString::from(confirm_password),
        birth_date,
    }
}

pub async fn register(storefront: &Storefront, form: &RegisterForm) -> Result<(), CliError> {
    storefront.register(form).await?;
    Ok(())
}

/// Print the logged-in user's profile.
pub async fn profile(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let user = storefront.queries().user_info().await?;
    let field = |value: Option<&str>| value.unwrap_or("-").to_string();

    writeln!(out, "Username: {}", field(user.user_name.as_deref()))?;
    writeln!(
        out,
        "Name:     {} {}",
        field(user.first_name.as_deref()),
        field(user.last_name.as_deref())
    )?;
    writeln!(out, "Email:    {}", field(user.email.as_deref()))?;
    writeln!(out, "Phone:    {}", field(user.phone_number.as_deref()))?;
    Ok(())
}

pub async fn change_password(
    storefront: &Storefront,
    old: String,
    new: String,
    confirm: Option<String>,
) -> Result<(), CliError> {
    let confirm = confirm.unwrap_or_else(|| new.clone());
    let form = ChangePasswordForm {
        old_password: SecretString::from(old),
        new_password: SecretString::from(new),
        confirm_password: SecretString::from(confirm),
    };
    storefront.change_password(&form).await?;
    Ok(())
}

/// Request a reset code and say what to run next.
pub async fn forgot_password(
    storefront: &Storefront,
    out: &mut impl Write,
    email: &str,
) -> Result<(), CliError> {
    storefront.forgot_password(email).await?;
    writeln!(out, "Next: tshop verify-code {} <code>", email.trim())?;
    Ok(())
}

pub async fn send_code(storefront: &Storefront, email: &str) -> Result<(), CliError> {
    storefront.send_code(email).await?;
    Ok(())
}

pub async fn verify_code(
    storefront: &Storefront,
    out: &mut impl Write,
    email: String,
    code: String,
) -> Result<(), CliError> {
    let form = VerifyCodeForm { email, code };
    storefront.verify_code(&form).await?;
    writeln!(out, "Next: tshop login -e {}", form.email.trim())?;
    Ok(())
}
