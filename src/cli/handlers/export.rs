use crate::cli::{ExportFormat, OutputFormatter};
use crate::config::Config;
use crate::core::{Status, Ticket};
use crate::error::{HelpdeskError, Result};
use crate::service::open_storage;
use crate::storage::{TicketFilter, TicketRepository};
use std::path::PathBuf;

/// Export tickets from the configured database
pub async fn handle_export_command(
    config: &Config,
    format: ExportFormat,
    output: Option<PathBuf>,
    status: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let filter = TicketFilter {
        status: status.map(str::parse::<Status>).transpose()?,
        ..TicketFilter::default()
    };

    let storage = open_storage(config).await?;
    let tickets = storage.list_tickets(&filter).await?;
    let rendered = export_tickets(&tickets, format)?;

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            formatter.success(&format!(
                "Exported {} tickets to {}",
                tickets.len(),
                path.display()
            ));
        },
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Render tickets in the requested format
pub fn export_tickets(tickets: &[Ticket], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(tickets)? + "\n"),
        ExportFormat::Yaml => Ok(serde_yaml::to_string(tickets)?),
        ExportFormat::Csv => export_csv(tickets),
    }
}

fn export_csv(tickets: &[Ticket]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "title",
        "description",
        "urgency",
        "status",
        "product",
        "customer_id",
        "created_at",
        "updated_at",
    ])?;

    for ticket in tickets {
        writer.write_record([
            ticket.id.to_string(),
            ticket.title.clone(),
            ticket.description.clone(),
            ticket.urgency.to_string(),
            ticket.status.to_string(),
            ticket.product.clone(),
            ticket.customer_id.to_string(),
            ticket.created_at.to_rfc3339(),
            ticket.updated_at.to_rfc3339(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| HelpdeskError::Serialization(format!("Failed to flush CSV: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| HelpdeskError::Serialization(format!("Invalid UTF-8 in CSV: {e}")))
}
