pub mod doctor;
pub mod init;
pub mod run;
pub mod serve;

use deepresearch_config::AppConfig;

/// Load configuration and check the credentials the enabled features need.
pub(crate) fn load_config(no_email: bool) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if no_email {
        config.research.send_email = false;
    }
    config.require_credentials()?;
    Ok(config)
}
