//! Eco Prom production core.
//!
//! Tracks production orders through their status pipeline, chains finished
//! stages into successor orders and keeps the material stock ledger.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - `PostgreSQL` repositories and transaction-scoped queries
//! - [`models`] - Orders, materials, users and notifications
//! - [`services`] - Order state machine, stage chaining, ledger, deadline scan
//! - [`telegram`] - Shared channel messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telegram;

pub use error::{LedgerError, OrderError};
