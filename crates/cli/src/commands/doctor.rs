//! `deepresearch doctor`: diagnose configuration and provider health.

use deepresearch_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 deepresearch doctor");
    println!("======================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ℹ️  No config file, using defaults (run `deepresearch init` to create one)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue found. Fix the configuration and run doctor again.");
            return Ok(());
        }
    };

    let missing = config.missing_credentials();
    if missing.is_empty() {
        println!("  ✅ Required credentials set");
    }
    for credential in &missing {
        println!("  ❌ {} is not set ({})", credential.var, credential.purpose);
        issues += 1;
    }

    if config.search.api_key.is_some() {
        println!("  ✅ Web search enabled");
    } else {
        println!("  ⚠️  EXA_API_KEY is not set; researchers will answer without web search");
    }

    if !config.research.send_email {
        println!("  ℹ️  Email delivery disabled");
    }

    match deepresearch_providers::build_from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' unhealthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' check failed: {e}", provider.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Provider not configured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
