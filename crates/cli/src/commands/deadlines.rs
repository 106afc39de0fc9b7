//! Deadline scan command.
//!
//! Meant to be run on a schedule (cron, systemd timer). Running it more often
//! than needed is harmless: every alert is sent at most once per order.
//!
//! ```bash
//! ecoprom check-deadlines
//! ```

use chrono::Utc;
use eco_prom_production::services::DeadlineScanner;

use super::{CommandError, Context};

/// Scan open orders for missed deadlines and send outstanding alerts.
pub async fn check(ctx: &Context) -> Result<(), CommandError> {
    let scanner = DeadlineScanner::new(ctx.pool.clone(), ctx.notifier.clone());
    let report = scanner.scan(Utc::now()).await?;

    if report.examined == 0 {
        tracing::info!("No overdue orders");
    } else {
        tracing::info!(
            examined = report.examined,
            breach_alerts = report.breach_alerts,
            channel_alerts = report.channel_alerts,
            "Overdue orders processed"
        );
    }
    Ok(())
}
