use crate::cli::OutputFormatter;
use crate::config::Config;
use crate::error::Result;
use crate::service::open_storage;

/// Create the database if needed and apply pending migrations
pub async fn handle_init_db_command(config: &Config, formatter: &OutputFormatter) -> Result<()> {
    let storage = open_storage(config).await?;
    storage.pool().close().await;

    if formatter.is_json() {
        formatter.print_json(&serde_json::json!({
            "status": "success",
            "database": config.database.url,
        }))?;
    } else {
        formatter.success(&format!("Database ready at {}", config.database.url));
    }
    Ok(())
}
