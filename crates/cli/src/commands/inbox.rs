//! In-app notification inbox of the acting user.
//!
//! ```bash
//! ecoprom --as usta1 inbox list
//! ecoprom --as usta1 inbox read --id 42
//! ```

use eco_prom_core::NotificationId;
use eco_prom_production::db::NotificationRepository;

use super::{CommandError, Context, print_json};

/// Show unread notifications, newest first.
pub async fn list(ctx: &Context) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let unread = NotificationRepository::new(&ctx.pool)
        .unread(actor.user_id)
        .await?;
    if unread.is_empty() {
        tracing::info!("No unread notifications");
        return Ok(());
    }
    print_json(&unread)
}

/// Mark one notification as read.
pub async fn mark_read(ctx: &Context, id: NotificationId) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    NotificationRepository::new(&ctx.pool)
        .mark_read(actor.user_id, id)
        .await?;
    tracing::info!("Notification {} marked as read", id);
    Ok(())
}
