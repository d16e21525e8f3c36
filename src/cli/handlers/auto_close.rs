use crate::cli::OutputFormatter;
use crate::config::Config;
use crate::error::Result;
use crate::service::Helpdesk;

/// Run one SLA sweep against the configured database
///
/// `days` overrides `sla.auto_close_after_days` for this run only.
pub async fn handle_auto_close_command(
    config: &Config,
    days: Option<i64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(days) = days {
        config.sla.auto_close_after_days = days;
    }
    // Checked before the database is touched
    config.validate()?;

    let helpdesk = Helpdesk::from_config(&config).await?;
    let report = helpdesk.lifecycle.auto_close_stale_pending().await?;

    if formatter.is_json() {
        formatter.print_json(&report)?;
    } else {
        formatter.success(&format!(
            "Auto-close sweep: {} answered, {} closed, {} failed",
            report.scanned, report.closed, report.failed
        ));
        formatter.info(&format!(
            "SLA window: {} days",
            config.sla.auto_close_after_days
        ));
    }
    Ok(())
}
