//! User and worker management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the first admin
//! ecoprom user create -u admin -n "Bosh admin" -r admin
//!
//! # Bind a user to a production stage
//! ecoprom worker create -u usta1 -t PANEL
//!
//! # Take a worker off stage chaining
//! ecoprom worker deactivate --id 3
//! ```
//!
//! User creation does not need `--as`: it is how the first admin gets in.

use eco_prom_core::{Role, WorkerId, WorkerType};
use eco_prom_production::db::UserRepository;
use eco_prom_production::models::{NewUser, NewWorker};

use super::{CommandError, Context};

/// Create a user.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create_user(
    ctx: &Context,
    username: &str,
    display_name: &str,
    role: Role,
) -> Result<i32, CommandError> {
    let username = username.trim();
    if username.is_empty() || username.contains(char::is_whitespace) {
        return Err(CommandError::InvalidArgument(
            "username",
            format!("{username:?} must be a single non-empty word"),
        ));
    }

    tracing::info!("Creating user: {} ({})", username, role);
    let user = UserRepository::new(&ctx.pool)
        .create_user(&NewUser {
            username: username.to_owned(),
            display_name: display_name.trim().to_owned(),
            role,
        })
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Role: {}",
        user.id,
        user.username,
        user.role
    );
    if role == Role::Worker {
        tracing::warn!("Workers also need a stage binding: ecoprom worker create -u {username} -t <TYPE>");
    }

    Ok(user.id.as_i32())
}

/// Bind an existing user to a production stage.
///
/// # Returns
///
/// The ID of the worker binding.
pub async fn create_worker(
    ctx: &Context,
    username: &str,
    worker_type: WorkerType,
) -> Result<i32, CommandError> {
    let users = UserRepository::new(&ctx.pool);
    let user = users
        .get_by_username(username)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(username.to_owned()))?;
    if user.role != Role::Worker {
        tracing::warn!("{} has role {}, not worker", user.username, user.role);
    }

    let worker = users
        .create_worker(NewWorker {
            user_id: user.id,
            worker_type,
        })
        .await?;

    tracing::info!(
        "Worker created! ID: {}, User: {}, Stage: {}",
        worker.id,
        user.username,
        worker.worker_type
    );
    Ok(worker.id.as_i32())
}

/// Activate or deactivate a worker binding.
pub async fn set_worker_active(
    ctx: &Context,
    id: WorkerId,
    active: bool,
) -> Result<(), CommandError> {
    UserRepository::new(&ctx.pool)
        .set_worker_active(id, active)
        .await?;
    if active {
        tracing::info!("Worker {} activated", id);
    } else {
        tracing::info!("Worker {} deactivated", id);
    }
    Ok(())
}
