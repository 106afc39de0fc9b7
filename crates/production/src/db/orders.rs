//! Database operations for production orders.
//!
//! Mutations run on a caller-owned transaction so that the status change,
//! its audit row and any chained successor commit together. Reads that feed
//! presentation or notification go through [`OrderRepository`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use eco_prom_core::{EvidenceSlot, Money, OrderId, OrderNumber, OrderStatus, UserId, WorkerId};

use super::users::WorkerRow;
use super::{RepositoryError, parse_column};
use crate::models::{DoorSpec, Order, OrderEvent, OrderFilter, OrderSpec, PanelSpec, Worker};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    customer_name: String,
    product_name: Option<String>,
    worker_type: String,
    status: String,
    panel_type: Option<String>,
    panel_subtype: Option<String>,
    panel_thickness: Option<i32>,
    door_type: Option<String>,
    door_frame_type: Option<String>,
    door_direction: Option<String>,
    door_height: Option<i32>,
    door_width: Option<i32>,
    area: Decimal,
    total_price: Decimal,
    prepayment: Decimal,
    deadline: Option<DateTime<Utc>>,
    comment: Option<String>,
    worker_comment: Option<String>,
    drawing_reference: Option<String>,
    parent_order_id: Option<i32>,
    created_by: i32,
    worker_started_at: Option<DateTime<Utc>>,
    worker_finished_at: Option<DateTime<Utc>>,
    start_evidence: Option<String>,
    start_evidence_uploaded_at: Option<DateTime<Utc>>,
    finish_evidence: Option<String>,
    finish_evidence_uploaded_at: Option<DateTime<Utc>>,
    deadline_breach_alert_sent: bool,
    overdue_channel_alert_sent: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.map(parse_column).transpose()
}

fn money_column(value: Decimal) -> Result<Money, RepositoryError> {
    Money::try_new(value).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            order_number: parse_column(&row.order_number)?,
            customer_name: row.customer_name,
            product_name: row.product_name,
            worker_type: parse_column(&row.worker_type)?,
            status: parse_column(&row.status)?,
            panel: PanelSpec {
                panel_type: parse_optional(row.panel_type.as_deref())?,
                subtype: parse_optional(row.panel_subtype.as_deref())?,
                thickness: row.panel_thickness,
            },
            door: DoorSpec {
                door_type: row.door_type,
                frame_type: row.door_frame_type,
                direction: parse_optional(row.door_direction.as_deref())?,
                height: row.door_height,
                width: row.door_width,
            },
            area: row.area,
            total_price: money_column(row.total_price)?,
            prepayment: money_column(row.prepayment)?,
            deadline: row.deadline,
            comment: row.comment,
            worker_comment: row.worker_comment,
            drawing_reference: row.drawing_reference,
            parent_order_id: row.parent_order_id.map(OrderId::new),
            created_by: UserId::new(row.created_by),
            worker_started_at: row.worker_started_at,
            worker_finished_at: row.worker_finished_at,
            start_evidence: row.start_evidence,
            start_evidence_uploaded_at: row.start_evidence_uploaded_at,
            finish_evidence: row.finish_evidence,
            finish_evidence_uploaded_at: row.finish_evidence_uploaded_at,
            deadline_breach_alert_sent: row.deadline_breach_alert_sent,
            overdue_channel_alert_sent: row.overdue_channel_alert_sent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderEventRow {
    id: i32,
    order_id: i32,
    action: String,
    from_status: Option<String>,
    to_status: String,
    actor_id: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderEventRow> for OrderEvent {
    type Error = RepositoryError;

    fn try_from(row: OrderEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            order_id: OrderId::new(row.order_id),
            action: row.action,
            from_status: parse_optional(row.from_status.as_deref())?,
            to_status: parse_column(&row.to_status)?,
            actor_id: UserId::new(row.actor_id),
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = "
    id, order_number, customer_name, product_name, worker_type, status,
    panel_type, panel_subtype, panel_thickness,
    door_type, door_frame_type, door_direction, door_height, door_width,
    area, total_price, prepayment, deadline, comment, worker_comment,
    drawing_reference, parent_order_id, created_by,
    worker_started_at, worker_finished_at,
    start_evidence, start_evidence_uploaded_at,
    finish_evidence, finish_evidence_uploaded_at,
    deadline_breach_alert_sent, overdue_channel_alert_sent,
    created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads outside a transaction.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM production_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an order by its order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM production_order WHERE order_number = $1"
        ))
        .bind(number.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM production_order o
             WHERE ($1::text IS NULL OR o.status = $1)
               AND ($2::text IS NULL OR o.worker_type = $2)
               AND ($3::int IS NULL OR EXISTS (
                    SELECT 1 FROM order_worker ow
                    JOIN worker w ON w.id = ow.worker_id
                    WHERE ow.order_id = o.id AND w.user_id = $3))
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.worker_type.map(|t| t.as_str()))
        .bind(filter.assigned_user)
        .bind(filter.limit.unwrap_or(100))
        .bind(filter.offset.unwrap_or(0))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Orders spawned from the given parent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn children(&self, parent: OrderId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM production_order
             WHERE parent_order_id = $1 ORDER BY id"
        ))
        .bind(parent)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Workers assigned to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn assigned_workers(&self, id: OrderId) -> Result<Vec<Worker>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        assigned_workers(&mut conn, id).await
    }

    /// Audit trail of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn events(&self, id: OrderId) -> Result<Vec<OrderEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderEventRow>(
            "SELECT id, order_id, action, from_status, to_status, actor_id, created_at
             FROM order_event WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Orders past their deadline that still have an alert outstanding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<Order>, RepositoryError> {
        let statuses: Vec<String> = OrderStatus::ALL
            .iter()
            .filter(|s| s.is_overdue_candidate())
            .map(|s| s.as_str().to_owned())
            .collect();

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM production_order
             WHERE deadline < $1
               AND status = ANY($2)
               AND (NOT deadline_breach_alert_sent OR NOT overdue_channel_alert_sent)
             ORDER BY deadline, id"
        ))
        .bind(now)
        .bind(statuses)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Allocate the next order number for `year`.
///
/// The counter row is incremented in place, so concurrent callers queue on
/// the row lock and each receive a distinct, increasing value. Rolling back
/// the enclosing transaction returns the number.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` once the four-digit sequence for the
/// year is used up.
pub async fn next_order_number(
    conn: &mut PgConnection,
    year: i32,
) -> Result<OrderNumber, RepositoryError> {
    let value = sqlx::query_scalar::<_, i32>(
        "INSERT INTO order_number_sequence (year, last_value) VALUES ($1, 1)
         ON CONFLICT (year) DO UPDATE
             SET last_value = order_number_sequence.last_value + 1
         RETURNING last_value",
    )
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    OrderNumber::new(year, i64::from(value))
        .map_err(|e| RepositoryError::Conflict(e.to_string()))
}

/// Everything needed to insert an order row.
#[derive(Debug)]
pub struct OrderInsert<'a> {
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub spec: &'a OrderSpec,
    pub parent_order_id: Option<OrderId>,
    pub created_by: UserId,
}

/// Insert an order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the parent already has a
/// successor or the order number is taken.
pub async fn insert_order(
    conn: &mut PgConnection,
    insert: &OrderInsert<'_>,
) -> Result<Order, RepositoryError> {
    let spec = insert.spec;
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO production_order (
            order_number, status, customer_name, product_name, worker_type,
            panel_type, panel_subtype, panel_thickness,
            door_type, door_frame_type, door_direction, door_height, door_width,
            area, total_price, prepayment, deadline, comment, drawing_reference,
            parent_order_id, created_by
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                 $14, $15, $16, $17, $18, $19, $20, $21)
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(insert.order_number.to_string())
    .bind(insert.status.as_str())
    .bind(&spec.customer_name)
    .bind(&spec.product_name)
    .bind(spec.worker_type.as_str())
    .bind(spec.panel.panel_type.map(|t| t.as_str()))
    .bind(spec.panel.subtype.map(|s| s.as_str()))
    .bind(spec.panel.thickness)
    .bind(&spec.door.door_type)
    .bind(&spec.door.frame_type)
    .bind(spec.door.direction.map(|d| d.as_str()))
    .bind(spec.door.height)
    .bind(spec.door.width)
    .bind(spec.area)
    .bind(spec.total_price)
    .bind(spec.prepayment)
    .bind(spec.deadline)
    .bind(&spec.comment)
    .bind(&spec.drawing_reference)
    .bind(insert.parent_order_id)
    .bind(insert.created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "order already exists"))?;

    row.try_into()
}

/// Read an order and hold its row lock until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM production_order WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Replace the editable fields of an order.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn update_spec(
    conn: &mut PgConnection,
    id: OrderId,
    spec: &OrderSpec,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE production_order SET
            customer_name = $2, product_name = $3, worker_type = $4,
            panel_type = $5, panel_subtype = $6, panel_thickness = $7,
            door_type = $8, door_frame_type = $9, door_direction = $10,
            door_height = $11, door_width = $12,
            area = $13, total_price = $14, prepayment = $15, deadline = $16,
            comment = $17, drawing_reference = $18, updated_at = NOW()
         WHERE id = $1
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(&spec.customer_name)
    .bind(&spec.product_name)
    .bind(spec.worker_type.as_str())
    .bind(spec.panel.panel_type.map(|t| t.as_str()))
    .bind(spec.panel.subtype.map(|s| s.as_str()))
    .bind(spec.panel.thickness)
    .bind(&spec.door.door_type)
    .bind(&spec.door.frame_type)
    .bind(spec.door.direction.map(|d| d.as_str()))
    .bind(spec.door.height)
    .bind(spec.door.width)
    .bind(spec.area)
    .bind(spec.total_price)
    .bind(spec.prepayment)
    .bind(spec.deadline)
    .bind(&spec.comment)
    .bind(&spec.drawing_reference)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Field changes written by a status transition.
#[derive(Debug, Default)]
pub struct TransitionUpdate<'a> {
    pub status: Option<OrderStatus>,
    pub worker_started_at: Option<DateTime<Utc>>,
    pub worker_finished_at: Option<DateTime<Utc>>,
    pub worker_comment: Option<&'a str>,
}

/// Write a status transition. Unset fields keep their stored value.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn apply_transition(
    conn: &mut PgConnection,
    id: OrderId,
    update: &TransitionUpdate<'_>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE production_order SET
            status = COALESCE($2, status),
            worker_started_at = COALESCE($3, worker_started_at),
            worker_finished_at = COALESCE($4, worker_finished_at),
            worker_comment = COALESCE($5, worker_comment),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(update.status.map(|s| s.as_str()))
    .bind(update.worker_started_at)
    .bind(update.worker_finished_at)
    .bind(update.worker_comment)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Store an evidence reference in one of the order's slots.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_evidence(
    conn: &mut PgConnection,
    id: OrderId,
    slot: EvidenceSlot,
    reference: &str,
    uploaded_at: DateTime<Utc>,
) -> Result<Order, RepositoryError> {
    let assignments = match slot {
        EvidenceSlot::Start => "start_evidence = $2, start_evidence_uploaded_at = $3",
        EvidenceSlot::Finish => "finish_evidence = $2, finish_evidence_uploaded_at = $3",
    };
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE production_order SET {assignments}, updated_at = NOW()
         WHERE id = $1
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(reference)
    .bind(uploaded_at)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Workers assigned to an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn assigned_workers(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Vec<Worker>, RepositoryError> {
    let rows = sqlx::query_as::<_, WorkerRow>(
        "SELECT w.id, w.user_id, w.worker_type, w.active
         FROM order_worker ow
         JOIN worker w ON w.id = ow.worker_id
         WHERE ow.order_id = $1
         ORDER BY w.id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Assign workers to an order, returning only the newly assigned ones.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if a worker does not exist.
pub async fn assign_workers(
    conn: &mut PgConnection,
    id: OrderId,
    workers: &[WorkerId],
) -> Result<Vec<WorkerId>, RepositoryError> {
    if workers.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = workers.iter().map(WorkerId::as_i32).collect();
    let assigned = sqlx::query_scalar::<_, i32>(
        "INSERT INTO order_worker (order_id, worker_id)
         SELECT $1, UNNEST($2::int[])
         ON CONFLICT DO NOTHING
         RETURNING worker_id",
    )
    .bind(id)
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_foreign_key(e, "unknown worker"))?;

    Ok(assigned.into_iter().map(WorkerId::new).collect())
}

/// The successor already spawned from `parent`, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn successor_of(
    conn: &mut PgConnection,
    parent: OrderId,
) -> Result<Option<OrderId>, RepositoryError> {
    let id = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM production_order WHERE parent_order_id = $1 LIMIT 1",
    )
    .bind(parent)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id.map(OrderId::new))
}

/// Append an audit row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_event(
    conn: &mut PgConnection,
    order_id: OrderId,
    action: &str,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    actor: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO order_event (order_id, action, from_status, to_status, actor_id)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order_id)
    .bind(action)
    .bind(from_status.map(|s| s.as_str()))
    .bind(to_status.as_str())
    .bind(actor)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// One-shot alert flags
// =============================================================================

/// Set the deadline-breach flag. Returns `true` only for the caller that
/// flipped it, so the alert goes out once however many callers race.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn claim_deadline_breach_alert<'e>(
    executor: impl PgExecutor<'e>,
    id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE production_order SET deadline_breach_alert_sent = TRUE
         WHERE id = $1 AND NOT deadline_breach_alert_sent",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Clear both one-shot deadline flags so the next breach alerts again.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn rearm_deadline_alerts(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE production_order
         SET deadline_breach_alert_sent = FALSE, overdue_channel_alert_sent = FALSE
         WHERE id = $1",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Set the overdue channel flag, with the same claim semantics as
/// [`claim_deadline_breach_alert`].
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn claim_overdue_channel_alert<'e>(
    executor: impl PgExecutor<'e>,
    id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE production_order SET overdue_channel_alert_sent = TRUE
         WHERE id = $1 AND NOT overdue_channel_alert_sent",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}
