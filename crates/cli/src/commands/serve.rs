//! `repobot serve`: start the webhook gateway.

use std::path::PathBuf;

pub async fn run(
    port_override: Option<u16>,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Repobot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Bot name:  {}", config.github.bot_name);
    println!("   Model:     {} ({})", config.model.model, config.model.provider);

    repobot_gateway::start(config).await?;

    Ok(())
}
