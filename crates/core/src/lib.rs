//! tshop core - shared domain types.
//!
//! This crate provides the types shared by every tshop component:
//! - `storefront` - API client, cart and session state, query cache
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP, no storage. This
//! keeps it lightweight and usable from anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, emails, roles and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
