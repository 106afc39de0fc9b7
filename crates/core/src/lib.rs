//! Eco Prom Core - Shared domain types for the production core.
//!
//! This crate provides the types shared by every Eco Prom component:
//! - `production` - Order state machine, stage chaining and inventory ledger
//! - `cli` - Command-line tools for migrations, deadline scans and stock entry
//!
//! # Architecture
//!
//! The core crate contains only types and pure codecs - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, statuses, quantities, order numbers and batch codes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
