//! Deadline scan for open orders.
//!
//! Meant to run on an external schedule. Each alert is claimed through its
//! one-shot flag before it is sent, so overlapping scans never alert twice.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::db::{OrderRepository, RepositoryError, orders};
use crate::services::notifier::{Notifier, overdue_notice};
use crate::services::state_machine::Audience;
use crate::telegram::build_overdue_message;

/// What a scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeadlineReport {
    /// Overdue orders with at least one alert outstanding.
    pub examined: usize,
    /// In-app breach alerts sent to admins and production leads.
    pub breach_alerts: usize,
    /// Orders posted to the channel.
    pub channel_alerts: usize,
}

/// Scans for open orders past their deadline.
#[derive(Debug, Clone)]
pub struct DeadlineScanner {
    pool: PgPool,
    notifier: Notifier,
}

impl DeadlineScanner {
    /// Create a new scanner.
    #[must_use]
    pub const fn new(pool: PgPool, notifier: Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Alert on every open order whose deadline is before `now`.
    ///
    /// The channel flag is only claimed while a channel is configured, so
    /// orders found before Telegram is set up still get posted later.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the scan query or a flag claim fails.
    #[instrument(skip(self))]
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<DeadlineReport, RepositoryError> {
        let overdue = OrderRepository::new(&self.pool).overdue(now).await?;
        let mut report = DeadlineReport {
            examined: overdue.len(),
            ..DeadlineReport::default()
        };

        for order in &overdue {
            if !order.deadline_breach_alert_sent
                && orders::claim_deadline_breach_alert(&self.pool, order.id).await?
            {
                self.notifier
                    .notify_audience(
                        order,
                        &[Audience::Admins, Audience::ProductionLeads],
                        &[],
                        None,
                        &overdue_notice(order),
                    )
                    .await;
                report.breach_alerts += 1;
            }

            if self.notifier.has_channel()
                && !order.overdue_channel_alert_sent
                && orders::claim_overdue_channel_alert(&self.pool, order.id).await?
            {
                if self.notifier.post_to_channel(&build_overdue_message(order)).await {
                    report.channel_alerts += 1;
                } else {
                    warn!(order_number = %order.order_number, "Overdue channel post failed");
                }
            }
        }

        info!(
            examined = report.examined,
            breach_alerts = report.breach_alerts,
            channel_alerts = report.channel_alerts,
            "Deadline scan finished"
        );

        Ok(report)
    }
}

