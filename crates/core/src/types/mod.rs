//! Core types for tshop.
//!
//! Type-safe wrappers for the domain concepts the storefront API exposes.

pub mod email;
pub mod id;
pub mod price;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use role::Role;
pub use status::OrderStatus;
