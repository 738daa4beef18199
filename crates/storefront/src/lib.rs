//! tshop storefront client library.
//!
//! Everything a storefront front end needs, minus the presentation:
//!
//! - [`api`]: gateway to the remote REST API (base URL, timeout, bearer
//!   token, error message extraction)
//! - [`session`]: login/admin state derived from the persisted token and role
//! - [`cart`]: the local cart reducer, its durable record and derived totals
//! - [`query`]: cached, deduplicated, retried remote reads
//! - [`commands`]: mutations with their notifications, invalidations and
//!   navigation intents
//!
//! Start from [`Storefront::open`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod commands;
pub mod config;
pub mod error;
pub mod forms;
pub mod navigation;
pub mod notify;
pub mod query;
pub mod session;
pub mod state;
pub mod storage;

pub use error::{Result, StorefrontError};
pub use state::Storefront;
