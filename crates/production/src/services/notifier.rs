//! Outbound notifications.
//!
//! Users get rows in the in-app inbox; shop-wide events also go to the
//! Telegram channel when one is configured. Delivery is fire-and-forget:
//! failures are logged and never reach the operation that triggered them.

use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use eco_prom_core::{OrderId, Role, UserId};

use crate::db::{NotificationRepository, RepositoryError, UserRepository};
use crate::models::{Order, Worker};
use crate::services::state_machine::Audience;
use crate::telegram::TelegramClient;

/// Sends in-app and channel notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    pool: PgPool,
    telegram: Option<TelegramClient>,
}

impl Notifier {
    /// Create a new notifier.
    #[must_use]
    pub const fn new(pool: PgPool, telegram: Option<TelegramClient>) -> Self {
        Self { pool, telegram }
    }

    /// Whether channel messages go anywhere.
    #[must_use]
    pub const fn has_channel(&self) -> bool {
        self.telegram.is_some()
    }

    /// Resolve audiences to concrete users, deduplicated, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if role lookups fail.
    pub async fn resolve(
        &self,
        order: &Order,
        audience: &[Audience],
        assigned: &[Worker],
    ) -> Result<Vec<UserId>, RepositoryError> {
        let mut roles = Vec::new();
        let mut recipients = Vec::new();

        for group in audience {
            match group {
                Audience::Creator => recipients.push(order.created_by),
                Audience::AssignedWorkers => {
                    recipients.extend(assigned.iter().map(|w| w.user_id));
                }
                Audience::ProductionLeads => roles.push(Role::ProductionLead),
                Audience::Managers => roles.push(Role::Manager),
                Audience::Admins => roles.push(Role::Admin),
            }
        }

        if !roles.is_empty() {
            let by_role = UserRepository::new(&self.pool)
                .active_user_ids_with_roles(&roles)
                .await?;
            recipients.extend(by_role);
        }

        let mut seen = std::collections::HashSet::new();
        recipients.retain(|id| seen.insert(*id));
        Ok(recipients)
    }

    /// Notify the given audiences about an order, skipping the acting user.
    #[instrument(skip(self, order, audience, assigned, message), fields(order_id = %order.id))]
    pub async fn notify_audience(
        &self,
        order: &Order,
        audience: &[Audience],
        assigned: &[Worker],
        actor: Option<UserId>,
        message: &str,
    ) {
        let recipients = match self.resolve(order, audience, assigned).await {
            Ok(mut recipients) => {
                if let Some(actor) = actor {
                    recipients.retain(|id| *id != actor);
                }
                recipients
            }
            Err(e) => {
                warn!(error = %e, "Failed to resolve notification recipients");
                return;
            }
        };

        self.notify_users(&recipients, Some(order.id), message).await;
    }

    /// Write one inbox row per recipient.
    #[instrument(skip(self, recipients, message), fields(count = recipients.len()))]
    pub async fn notify_users(&self, recipients: &[UserId], order: Option<OrderId>, message: &str) {
        if recipients.is_empty() {
            return;
        }

        match NotificationRepository::new(&self.pool)
            .insert_many(recipients, order, message)
            .await
        {
            Ok(count) => debug!(count, "Stored notifications"),
            Err(e) => warn!(error = %e, "Failed to store notifications"),
        }
    }

    /// Post to the shared channel. Returns whether the message was delivered.
    pub async fn post_to_channel(&self, text: &str) -> bool {
        let Some(telegram) = &self.telegram else {
            debug!("Telegram not configured, skipping channel message");
            return false;
        };

        match telegram.send_message(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to post channel message");
                false
            }
        }
    }

    /// Display name of a user, falling back to the numeric ID.
    pub async fn display_name(&self, user: UserId) -> String {
        match UserRepository::new(&self.pool).get_user(user).await {
            Ok(Some(u)) => u.display_name,
            Ok(None) => format!("#{user}"),
            Err(e) => {
                warn!(error = %e, user_id = %user, "Failed to load user for notification");
                format!("#{user}")
            }
        }
    }
}

/// In-app text for a committed status change.
#[must_use]
pub fn status_notice(order: &Order) -> String {
    format!(
        "{} ({}): {}",
        order.order_number,
        order.customer_name,
        order.status.label()
    )
}

/// In-app text for a worker assigned to a chained order.
#[must_use]
pub fn assignment_notice(order: &Order) -> String {
    format!(
        "Sizga yangi buyurtma biriktirildi: {} ({})",
        order.order_number, order.customer_name
    )
}

/// In-app text for a finish after the deadline.
#[must_use]
pub fn deadline_breach_notice(order: &Order) -> String {
    format!(
        "{} ({}) muddatidan kech yakunlandi",
        order.order_number, order.customer_name
    )
}

/// In-app text for an open order past its deadline.
#[must_use]
pub fn overdue_notice(order: &Order) -> String {
    format!(
        "{} ({}) muddati o'tdi: {}",
        order.order_number,
        order.customer_name,
        order.status.label()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use eco_prom_core::{Money, OrderNumber, OrderStatus, WorkerType};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{DoorSpec, PanelSpec};

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(3),
            order_number: OrderNumber::new(2026, 3).unwrap(),
            customer_name: "Nur Qurilish".to_owned(),
            product_name: None,
            worker_type: WorkerType::Ugol,
            status: OrderStatus::Tasdiqlandi,
            panel: PanelSpec::default(),
            door: DoorSpec::default(),
            area: Decimal::ZERO,
            total_price: Money::ZERO,
            prepayment: Money::ZERO,
            deadline: None,
            comment: None,
            worker_comment: None,
            drawing_reference: None,
            parent_order_id: None,
            created_by: UserId::new(1),
            worker_started_at: None,
            worker_finished_at: None,
            start_evidence: None,
            start_evidence_uploaded_at: None,
            finish_evidence: None,
            finish_evidence_uploaded_at: None,
            deadline_breach_alert_sent: false,
            overdue_channel_alert_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_notice_texts() {
        let o = order();
        assert_eq!(status_notice(&o), "ORD-2026-0003 (Nur Qurilish): 2. Tasdiqlandi");
        assert_eq!(
            assignment_notice(&o),
            "Sizga yangi buyurtma biriktirildi: ORD-2026-0003 (Nur Qurilish)"
        );
        assert!(deadline_breach_notice(&o).ends_with("muddatidan kech yakunlandi"));
        assert!(overdue_notice(&o).contains("muddati o'tdi"));
    }
}
