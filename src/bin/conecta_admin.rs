use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use conecta_api::{
    auth::{AccessCodeService, AuthConfig, AuthService, LoggingCodeDelivery},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{
        guardian, homologation, product, product_approval, product_variant, school,
        school_manager, student, supplier,
    },
    events::{Event, EventSender},
    migrator::Migrator,
    services::commission::{previous_month, CommissionService},
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate(command) => handle_migrate_command(&context, command).await?,
        Commands::Statements(command) => {
            handle_statements_command(&context, command, cli.json).await?
        }
        Commands::Seed(command) => handle_seed_command(&context, command, cli.json).await?,
        Commands::PurgeCodes => {
            let purged = context.access_code_service().purge_expired().await?;
            if cli.json {
                print_json(&serde_json::json!({ "purged": purged }))?;
            } else {
                println!("Purged {} used or expired access codes", purged);
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "conecta-admin",
    about = "Operational commands for the Conecta API database",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply or roll back schema migrations
    #[command(subcommand)]
    Migrate(MigrateCommands),
    /// Commission statement maintenance
    #[command(subcommand)]
    Statements(StatementsCommands),
    /// Load sample data
    #[command(subcommand)]
    Seed(SeedCommands),
    /// Delete used and expired login codes
    PurgeCodes,
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Apply pending migrations
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
}

#[derive(Subcommand)]
enum StatementsCommands {
    /// Generate or refresh statements for one month (defaults to last month)
    Generate(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long, requires = "month")]
    year: Option<i32>,
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,
}

#[derive(Subcommand)]
enum SeedCommands {
    /// One school, one supplier and a guardian with a linked student
    Demo,
}

async fn handle_migrate_command(context: &CliContext, command: MigrateCommands) -> Result<()> {
    match command {
        MigrateCommands::Up => {
            db::run_migrations(&context.db).await?;
            println!("Migrations applied");
        }
        MigrateCommands::Down { steps } => {
            Migrator::down(&*context.db, Some(steps))
                .await
                .context("failed to roll back migrations")?;
            println!("Rolled back {} migration(s)", steps);
        }
        MigrateCommands::Status => {
            Migrator::status(&*context.db)
                .await
                .context("failed to read migration status")?;
        }
    }
    Ok(())
}

async fn handle_statements_command(
    context: &CliContext,
    command: StatementsCommands,
    json: bool,
) -> Result<()> {
    match command {
        StatementsCommands::Generate(args) => {
            let (year, month) = match (args.year, args.month) {
                (Some(year), Some(month)) => (year, month),
                _ => previous_month(Utc::now().date_naive()),
            };

            let statements = context
                .commission_service()
                .generate_monthly_statement(year, month)
                .await
                .with_context(|| format!("failed to generate statements for {}-{:02}", year, month))?;

            if json {
                print_json(&statements)?;
            } else if statements.is_empty() {
                println!("No billable sales in {}-{:02}", year, month);
            } else {
                println!("Statements for {}-{:02}:", year, month);
                for statement in &statements {
                    println!(
                        "- supplier {} • sales {} • commission {} • net {} • {}",
                        statement.supplier_id,
                        statement.total_sales,
                        statement.total_commission,
                        statement.net_amount,
                        statement.status
                    );
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct DemoDataset {
    school_id: Uuid,
    manager_email: String,
    supplier_id: Uuid,
    supplier_email: String,
    guardian_email: String,
    student_id: Uuid,
    product_id: Uuid,
}

async fn handle_seed_command(context: &CliContext, command: SeedCommands, json: bool) -> Result<()> {
    match command {
        SeedCommands::Demo => {
            let dataset = seed_demo(&context.db).await.context("failed to seed demo data")?;
            if json {
                print_json(&dataset)?;
            } else {
                println!("Demo data created:");
                println!("- school {} (manager {})", dataset.school_id, dataset.manager_email);
                println!("- supplier {} ({})", dataset.supplier_id, dataset.supplier_email);
                println!("- guardian {} with student {}", dataset.guardian_email, dataset.student_id);
                println!("- product {}", dataset.product_id);
            }
        }
    }
    Ok(())
}

async fn seed_demo(db: &DbPool) -> Result<DemoDataset> {
    let now = Utc::now();
    let suffix = now.timestamp();
    let grade = "5º ano".to_string();
    let txn = db.begin().await?;

    let school = school::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Escola Demonstração".into()),
        active: Set(true),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let manager_email = format!("gestor+{}@demo.conecta", suffix);
    school_manager::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Gestora Demo".into()),
        email: Set(manager_email.clone()),
        phone: Set(None),
        school_id: Set(school.id),
        active: Set(true),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let supplier_email = format!("fornecedor+{}@demo.conecta", suffix);
    let supplier = supplier::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Malharia Demo".into()),
        email: Set(supplier_email.clone()),
        phone: Set(None),
        tax_id: Set(None),
        active: Set(true),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    homologation::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school.id),
        supplier_id: Set(supplier.id),
        active: Set(true),
        approved_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let product = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        supplier_id: Set(supplier.id),
        name: Set("Camiseta Polo".into()),
        description: Set(Some("Malha piquet com brasão bordado".into())),
        price: Set(dec!(50.00)),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    for size in ["P", "M", "G"] {
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            size: Set(size.into()),
            color: Set("Branco".into()),
            gender: Set(product_variant::UNISEX.into()),
            stock_quantity: Set(10),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
    }

    product_approval::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        school_id: Set(school.id),
        grade: Set(grade.clone()),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let student = student::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school.id),
        name: Set("Aluna Demo".into()),
        enrollment: Set(format!("{}-{}", now.year(), suffix)),
        grade: Set(grade),
        gender: Set("Feminino".into()),
        active: Set(true),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let guardian_email = format!("responsavel+{}@demo.conecta", suffix);
    guardian::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Responsável Demo".into()),
        email: Set(guardian_email.clone()),
        phone: Set(None),
        student_id: Set(Some(student.id)),
        active: Set(true),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok(DemoDataset {
        school_id: school.id,
        manager_email,
        supplier_id: supplier.id,
        supplier_email,
        guardian_email,
        student_id: student.id,
        product_id: product.id,
    })
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(&config.log_level, config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(32);
        let event_sender = Arc::new(EventSender::new(event_tx));

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!(target: "conecta_admin", event = ?event, "received async event");
            }
        });

        Ok(Self {
            config,
            db,
            event_sender,
        })
    }

    fn commission_service(&self) -> CommissionService {
        CommissionService::new(self.db.clone(), self.event_sender.clone())
    }

    fn access_code_service(&self) -> AccessCodeService {
        AccessCodeService::new(
            self.db.clone(),
            Arc::new(AuthService::new(AuthConfig::from(&self.config))),
            Arc::new(LoggingCodeDelivery),
            self.event_sender.clone(),
            self.config.access_code_length,
            Duration::from_secs(self.config.access_code_ttl_secs),
        )
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
