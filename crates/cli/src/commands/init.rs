//! `deepresearch init`: write a default config file.

use deepresearch_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🔬 deepresearch setup");
    println!("=====================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("  Config file exists: {}", config_path.display());
        println!("  Pass --force to overwrite it.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());

    println!("\nCredentials are read from the environment (or a .env file):");
    println!("  OPENAI_API_KEY          model access");
    println!("  RESEND_API_KEY          emailing reports");
    println!("  DEEPRESEARCH_EMAIL_TO   report recipient");
    println!("  EXA_API_KEY             web search (optional)");
    println!("\nRun `deepresearch doctor` to check the setup.");

    Ok(())
}
