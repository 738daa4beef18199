//! Subcommand implementations.
//!
//! Every command writes its output to the `out` it is given. Notifications
//! are printed by `main` once the command returns.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod local_cart;
pub mod orders;

use thiserror::Error;

use tshop_storefront::StorefrontError;
use tshop_storefront::config::ConfigError;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// A storefront operation failed; the user has already been notified.
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
