use crate::cli::OutputFormatter;
use crate::config::Config;
use crate::error::Result;
use crate::service::Helpdesk;
use std::sync::Arc;

/// Run the HTTP API until shutdown
pub async fn handle_serve_command(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut server = config.server.clone();
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }

    let helpdesk = Arc::new(Helpdesk::from_config(config).await?);
    let address = server.address();
    formatter.info(&format!("Serving helpdesk API on http://{address}"));
    crate::api::serve(helpdesk, &address).await
}
