//! `deepresearch serve`: start the HTTP gateway.

pub async fn run(
    port_override: Option<u16>,
    host_override: Option<String>,
    no_email: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(no_email)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("🔬 deepresearch gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model: {}", config.model);
    println!("   Email reports: {}", config.research.send_email);

    deepresearch_gateway::start(config).await?;

    Ok(())
}
