use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Apply pending migrations to the configured database")]
    Migrate,

    #[command(about = "Check database connectivity")]
    Ping,
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DbCommands::Migrate => {
            DatabaseManager::migrate().await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "migrated": true })),
                OutputFormat::Text => println!("Migrations applied"),
            }
            Ok(())
        }
        DbCommands::Ping => {
            DatabaseManager::health_check().await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "database": "ok" })),
                OutputFormat::Text => println!("Database connection OK"),
            }
            Ok(())
        }
    }
}
