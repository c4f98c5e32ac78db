//! Web server command.

use console::style;

use super::helpers::build_analyzer;
use crate::config::{ServerConfig, Settings};
use crate::server::AppState;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, &settings.server)?,
        None => (settings.server.host.clone(), settings.server.port),
    };
    let analyzer = build_analyzer(settings)?;

    println!(
        "{} Starting pdfsage at http://{}:{} (model {})",
        style("→").cyan(),
        host,
        port,
        analyzer.model_name()
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(AppState::new(analyzer), &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "8080" -> default host, port 8080
/// - Just a host: "0.0.0.0" -> 0.0.0.0, default port
/// - Host and port: "0.0.0.0:8080"
fn parse_bind_address(bind: &str, defaults: &ServerConfig) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("empty bind address");
    }

    if let Ok(port) = bind.parse::<u16>() {
        return Ok((defaults.host.clone(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), defaults.port))
}
