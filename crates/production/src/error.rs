//! Error types for production operations.

use thiserror::Error;

use eco_prom_core::{EvidenceSlot, OrderStatus, QuantityError, Role, StockQuantity};

use crate::db::RepositoryError;
use crate::services::authz::Action;
use crate::services::state_machine::TransitionAction;
use crate::services::validation::ValidationErrors;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The submitted spec failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The action is not legal from the order's current status.
    #[error("cannot {action} an order in status {from}")]
    InvalidTransition {
        from: OrderStatus,
        action: TransitionAction,
    },

    /// The actor may not perform the action on this order.
    #[error("{role} is not allowed to {action}")]
    Forbidden { role: Role, action: Action },

    /// An evidence image must be attached first.
    #[error("{slot} evidence is required")]
    MissingEvidence { slot: EvidenceSlot },

    /// The order does not exist.
    #[error("order not found")]
    NotFound,

    /// The order is in a terminal status and can no longer be edited.
    #[error("order is closed ({status})")]
    Closed { status: OrderStatus },

    /// Storage failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors from inventory ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The quantity is not positive or has too many fractional digits.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// An outbound entry would take stock below zero.
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        available: StockQuantity,
        requested: StockQuantity,
    },

    /// The material does not exist.
    #[error("material not found")]
    NotFound,

    /// The actor may not perform the action.
    #[error("{role} is not allowed to {action}")]
    Forbidden { role: Role, action: Action },

    /// A receipt would exceed the representable stock.
    #[error("stock overflow: {available} on hand, {requested} received")]
    StockOverflow {
        available: StockQuantity,
        requested: StockQuantity,
    },

    /// Batch codes are only assigned to receipts.
    #[error("batch codes are only assigned to IN transactions")]
    BatchCodeNotAllowed,

    /// No free batch code was found.
    #[error("no free batch code after {attempts} attempts")]
    BatchCodeExhausted { attempts: u32 },

    /// Storage failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}
