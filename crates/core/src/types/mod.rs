//! Core types for Eco Prom.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod batch_code;
pub mod id;
pub mod order_number;
pub mod quantity;
pub mod status;

pub use batch_code::{BatchCode, BatchCodeError};
pub use id::*;
pub use order_number::{OrderNumber, OrderNumberError};
pub use quantity::{Money, QuantityError, StockQuantity};
pub use status::*;
