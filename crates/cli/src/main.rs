//! Eco Prom CLI - Migrations, deadline scans and production management.
//!
//! # Usage
//!
//! ```bash
//! # Apply the production schema
//! ecoprom migrate
//!
//! # Alert on overdue orders (run from cron)
//! ecoprom check-deadlines
//!
//! # Create the first admin
//! ecoprom user create -u admin -n "Bosh admin" -r admin
//!
//! # Record a stock receipt as user "ombor"
//! ecoprom --as ombor stock record -m "Steel-2mm" -d IN -q 500 --batch
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `check-deadlines` - Send outstanding deadline alerts
//! - `user` / `worker` - Manage users and stage bindings
//! - `order` - Create, inspect and move orders through the pipeline
//! - `category` / `material` / `stock` - Inventory and stock ledger
//! - `inbox` - In-app notifications of the acting user

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use eco_prom_core::{
    EvidenceSlot, NotificationId, OrderNumber, OrderStatus, Role, TransactionDirection,
    UnitOfMeasure, WorkerId, WorkerType,
};
use eco_prom_production::config::ProductionConfig;
use eco_prom_production::services::TransitionAction;
use eco_prom_production::services::ledger::DEFAULT_JOURNAL_LIMIT;
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Context;
use commands::inventory::{MaterialArgs, StockArgs};

#[derive(Parser)]
#[command(name = "ecoprom")]
#[command(author, version, about = "Eco Prom production tools")]
struct Cli {
    /// Username of the acting user
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Send alerts for open orders past their deadline
    CheckDeadlines,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage worker stage bindings
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },
    /// Manage production orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Manage material categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Manage materials
    Material {
        #[command(subcommand)]
        action: MaterialAction,
    },
    /// Record and inspect stock
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Read your notifications
    Inbox {
        #[command(subcommand)]
        action: InboxAction,
    },
}

#[derive(Subcommand)]
enum InboxAction {
    /// Show unread notifications
    List,
    /// Mark a notification as read
    Read {
        #[arg(long)]
        id: i32,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Name shown in notifications
        #[arg(short, long)]
        name: String,

        /// Role (`admin`, `manager`, `production_lead`, `worker`, `observer`)
        #[arg(short, long, default_value = "worker")]
        role: Role,
    },
}

#[derive(Subcommand)]
enum WorkerAction {
    /// Bind a user to a production stage
    Create {
        /// Username of the worker
        #[arg(short, long)]
        username: String,

        /// Stage (`LIST`, `ESHIK`, `LIST_ESHIK`, `PANEL`, `UGOL`)
        #[arg(short = 't', long = "type")]
        worker_type: WorkerType,
    },
    /// Put a worker back on stage chaining
    Activate {
        #[arg(long)]
        id: i32,
    },
    /// Take a worker off stage chaining
    Deactivate {
        #[arg(long)]
        id: i32,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Create an order from a JSON spec file
    Create {
        #[arg(short, long)]
        file: String,
    },
    /// List orders, newest first
    List {
        #[arg(short, long)]
        status: Option<OrderStatus>,

        #[arg(short = 't', long = "type")]
        worker_type: Option<WorkerType>,

        /// Only orders assigned to the acting user
        #[arg(long)]
        mine: bool,

        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Show an order with its assignments and history
    Show { number: OrderNumber },
    /// Assign workers to an order
    Assign {
        number: OrderNumber,

        /// Worker ID (repeatable)
        #[arg(short, long = "worker", required = true)]
        workers: Vec<i32>,
    },
    /// Attach an evidence image reference
    Evidence {
        number: OrderNumber,

        /// `start` or `finish`
        slot: EvidenceSlot,

        reference: String,
    },
    /// Apply a status transition
    Transition {
        number: OrderNumber,

        /// `approve`, `reject`, `worker_accept`, `worker_start`, `worker_finish`,
        /// `start_production`, `mark_ready` or `complete`
        action: TransitionAction,

        /// Worker comment
        #[arg(short, long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create a category
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum MaterialAction {
    /// Create a material with zero stock
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        product_name: Option<String>,

        /// Category name
        #[arg(short, long)]
        category: Option<String>,

        /// Unit (`kg`, `m2`, `son`, `m`, `litr`)
        #[arg(short, long, default_value = "son")]
        unit: UnitOfMeasure,

        #[arg(long, default_value = "0")]
        price: Decimal,

        #[arg(long, default_value = "0")]
        min: Decimal,

        #[arg(long)]
        max: Option<Decimal>,

        /// QR or barcode
        #[arg(long)]
        code: Option<String>,
    },
    /// List all materials
    List,
    /// Delete a material with no stock history
    Delete {
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Record a movement
    Record {
        /// Material name
        #[arg(short, long)]
        material: String,

        /// `IN` or `OUT`
        #[arg(short, long)]
        direction: TransactionDirection,

        #[arg(short, long)]
        quantity: Decimal,

        /// Order the material is used for
        #[arg(short, long)]
        order: Option<OrderNumber>,

        /// Who physically received or took the goods
        #[arg(short, long)]
        received_by: Option<String>,

        #[arg(long)]
        note: Option<String>,

        /// Assign a batch code (receipts only)
        #[arg(long)]
        batch: bool,
    },
    /// Show a material's current stock
    Show {
        #[arg(short, long)]
        material: String,
    },
    /// Show a material's journal, newest first
    Journal {
        #[arg(short, long)]
        material: String,

        #[arg(short, long, default_value_t = DEFAULT_JOURNAL_LIMIT)]
        limit: i64,
    },
    /// List materials at or below minimum stock
    Low,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ProductionConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eco_prom_production=info,ecoprom=info".into());

    let json_layer = log_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ProductionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet: fall back to plain text logging for this one error.
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing(config.log_json);
    if sentry_guard.is_some() {
        tracing::debug!("Sentry initialized");
    }

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // process::exit skips destructors, so flush Sentry first
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ProductionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::connect(config, cli.actor).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&ctx.pool).await?,
        Commands::CheckDeadlines => commands::deadlines::check(&ctx).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                name,
                role,
            } => {
                commands::users::create_user(&ctx, &username, &name, role).await?;
            }
        },
        Commands::Worker { action } => match action {
            WorkerAction::Create {
                username,
                worker_type,
            } => {
                commands::users::create_worker(&ctx, &username, worker_type).await?;
            }
            WorkerAction::Activate { id } => {
                commands::users::set_worker_active(&ctx, WorkerId::new(id), true).await?;
            }
            WorkerAction::Deactivate { id } => {
                commands::users::set_worker_active(&ctx, WorkerId::new(id), false).await?;
            }
        },
        Commands::Order { action } => match action {
            OrderAction::Create { file } => commands::orders::create(&ctx, &file).await?,
            OrderAction::List {
                status,
                worker_type,
                mine,
                limit,
            } => commands::orders::list(&ctx, status, worker_type, mine, limit).await?,
            OrderAction::Show { number } => commands::orders::show(&ctx, &number).await?,
            OrderAction::Assign { number, workers } => {
                commands::orders::assign(&ctx, &number, &workers).await?;
            }
            OrderAction::Evidence {
                number,
                slot,
                reference,
            } => commands::orders::attach_evidence(&ctx, &number, slot, &reference).await?,
            OrderAction::Transition {
                number,
                action,
                comment,
            } => {
                commands::orders::transition(&ctx, &number, action, comment.as_deref()).await?;
            }
        },
        Commands::Category { action } => match action {
            CategoryAction::Create { name, description } => {
                commands::inventory::create_category(&ctx, &name, description).await?;
            }
        },
        Commands::Material { action } => match action {
            MaterialAction::Create {
                name,
                product_name,
                category,
                unit,
                price,
                min,
                max,
                code,
            } => {
                commands::inventory::create_material(
                    &ctx,
                    MaterialArgs {
                        name,
                        product_name,
                        category,
                        unit,
                        price,
                        min_stock: min,
                        max_stock: max,
                        code,
                    },
                )
                .await?;
            }
            MaterialAction::List => commands::inventory::list_materials(&ctx).await?,
            MaterialAction::Delete { name } => {
                commands::inventory::delete_material(&ctx, &name).await?;
            }
        },
        Commands::Stock { action } => match action {
            StockAction::Record {
                material,
                direction,
                quantity,
                order,
                received_by,
                note,
                batch,
            } => {
                commands::inventory::record(
                    &ctx,
                    StockArgs {
                        material,
                        direction,
                        quantity,
                        order,
                        received_by,
                        note,
                        batch,
                    },
                )
                .await?;
            }
            StockAction::Show { material } => commands::inventory::show(&ctx, &material).await?,
            StockAction::Journal { material, limit } => {
                commands::inventory::journal(&ctx, &material, limit).await?;
            }
            StockAction::Low => commands::inventory::low(&ctx).await?,
        },
        Commands::Inbox { action } => match action {
            InboxAction::List => commands::inbox::list(&ctx).await?,
            InboxAction::Read { id } => {
                commands::inbox::mark_read(&ctx, NotificationId::new(id)).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_actor_flag_is_global() {
        let cli = Cli::try_parse_from([
            "ecoprom",
            "order",
            "transition",
            "ORD-2026-0007",
            "worker_finish",
            "--as",
            "usta1",
        ])
        .expect("valid arguments");
        assert_eq!(cli.actor.as_deref(), Some("usta1"));
        assert!(matches!(
            cli.command,
            Commands::Order {
                action: OrderAction::Transition {
                    action: TransitionAction::WorkerFinish,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_typed_arguments_reject_bad_values() {
        assert!(Cli::try_parse_from(["ecoprom", "user", "create", "-u", "a", "-n", "A", "-r", "root"]).is_err());
        assert!(Cli::try_parse_from(["ecoprom", "order", "show", "2026-0007"]).is_err());
        assert!(
            Cli::try_parse_from(["ecoprom", "stock", "record", "-m", "x", "-d", "SIDEWAYS", "-q", "1"])
                .is_err()
        );
    }

    #[test]
    fn test_stock_record_parses_decimal_and_order() {
        let cli = Cli::try_parse_from([
            "ecoprom", "stock", "record", "-m", "Steel-2mm", "-d", "OUT", "-q", "42.5", "-o",
            "ORD-2026-0007",
        ])
        .expect("valid arguments");
        let Commands::Stock {
            action: StockAction::Record {
                quantity, order, batch, ..
            },
        } = cli.command
        else {
            panic!("expected stock record");
        };
        assert_eq!(quantity, "42.5".parse::<Decimal>().expect("decimal"));
        assert_eq!(order.map(|n| n.to_string()).as_deref(), Some("ORD-2026-0007"));
        assert!(!batch);
    }

    #[test]
    fn test_order_list_mine_flag() {
        let cli = Cli::try_parse_from(["ecoprom", "--as", "usta1", "order", "list", "--mine"])
            .expect("valid arguments");
        assert!(matches!(
            cli.command,
            Commands::Order {
                action: OrderAction::List { mine: true, .. }
            }
        ));
        let cli = Cli::try_parse_from(["ecoprom", "order", "list"]).expect("valid arguments");
        assert!(matches!(
            cli.command,
            Commands::Order {
                action: OrderAction::List { mine: false, limit: 50, .. }
            }
        ));
    }
}
