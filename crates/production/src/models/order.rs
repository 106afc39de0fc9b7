//! Production order domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eco_prom_core::{
    DoorDirection, EvidenceSlot, Money, OrderEventId, OrderId, OrderNumber, OrderStatus,
    PanelSubtype, PanelType, UserId, WorkerType,
};

/// Sandwich panel specification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSpec {
    /// Core material.
    pub panel_type: Option<PanelType>,
    /// Product line, PIR only.
    pub subtype: Option<PanelSubtype>,
    /// Thickness in millimetres.
    pub thickness: Option<i32>,
}

/// Door specification, required for door-bearing worker types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSpec {
    pub door_type: Option<String>,
    pub frame_type: Option<String>,
    pub direction: Option<DoorDirection>,
    /// Height in millimetres.
    pub height: Option<i32>,
    /// Width in millimetres.
    pub width: Option<i32>,
}

/// The editable part of an order, as submitted on create and update.
///
/// Amounts arrive as raw decimals and are checked by the validator before
/// they are turned into [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub customer_name: String,
    pub product_name: Option<String>,
    pub worker_type: WorkerType,
    #[serde(default)]
    pub panel: PanelSpec,
    #[serde(default)]
    pub door: DoorSpec,
    /// Panel area in square metres.
    pub area: Decimal,
    pub total_price: Decimal,
    pub prepayment: Decimal,
    pub deadline: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    /// Reference to the drawing/PDF held by the file store.
    pub drawing_reference: Option<String>,
}

/// A production order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub product_name: Option<String>,
    pub worker_type: WorkerType,
    pub status: OrderStatus,
    pub panel: PanelSpec,
    pub door: DoorSpec,
    pub area: Decimal,
    pub total_price: Money,
    pub prepayment: Money,
    pub deadline: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub worker_comment: Option<String>,
    pub drawing_reference: Option<String>,
    /// The order whose completion spawned this one.
    pub parent_order_id: Option<OrderId>,
    pub created_by: UserId,
    pub worker_started_at: Option<DateTime<Utc>>,
    pub worker_finished_at: Option<DateTime<Utc>>,
    pub start_evidence: Option<String>,
    pub start_evidence_uploaded_at: Option<DateTime<Utc>>,
    pub finish_evidence: Option<String>,
    pub finish_evidence_uploaded_at: Option<DateTime<Utc>>,
    /// Set once the "finished after deadline" alert has gone out.
    pub deadline_breach_alert_sent: bool,
    /// Set once the deadline scan has posted this order to the channel.
    pub overdue_channel_alert_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Amount still owed by the customer, never negative.
    #[must_use]
    pub fn remaining_amount(&self) -> Money {
        self.total_price.remaining_after(self.prepayment)
    }

    /// Reference stored in an evidence slot, if any.
    #[must_use]
    pub fn evidence(&self, slot: EvidenceSlot) -> Option<&str> {
        match slot {
            EvidenceSlot::Start => self.start_evidence.as_deref(),
            EvidenceSlot::Finish => self.finish_evidence.as_deref(),
        }
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

/// A successor order derived from a finished parent, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChildOrder {
    pub parent_order_id: OrderId,
    /// Inherited from the parent.
    pub created_by: UserId,
    pub spec: OrderSpec,
}

/// One committed change in an order's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: OrderEventId,
    pub order_id: OrderId,
    /// What happened (`create`, `chain`, `update`, `approve`, ...).
    pub action: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Filter for listing orders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub worker_type: Option<WorkerType>,
    /// Only orders assigned to this user's worker binding.
    pub assigned_user: Option<UserId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
