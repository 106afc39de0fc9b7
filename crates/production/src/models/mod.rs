//! Domain models for the production core.

pub mod material;
pub mod notification;
pub mod order;
pub mod user;

pub use material::{
    Category, LedgerReceipt, Material, NewCategory, NewMaterial, StockEntry, StockTransaction,
};
pub use notification::Notification;
pub use order::{DoorSpec, NewChildOrder, Order, OrderEvent, OrderFilter, OrderSpec, PanelSpec};
pub use user::{NewUser, NewWorker, User, Worker};
