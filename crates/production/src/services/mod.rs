//! Business services.
//!
//! Pure rules ([`validation`], [`authz`], [`state_machine`], the successor
//! derivation in [`chaining`]) are kept apart from the services that apply
//! them under row locks ([`orders`], [`ledger`], [`deadlines`]).

pub mod authz;
pub mod chaining;
pub mod deadlines;
pub mod ledger;
pub mod notifier;
pub mod orders;
pub mod state_machine;
pub mod validation;

pub use authz::{Action, Actor};
pub use chaining::{ChainOutcome, ChainingFailure};
pub use deadlines::{DeadlineReport, DeadlineScanner};
pub use ledger::LedgerService;
pub use notifier::Notifier;
pub use orders::{OrderService, TransitionOutcome};
pub use state_machine::{TransitionAction, TransitionPlan};
pub use validation::{FieldError, ValidationErrors, ValidationMode};
