use super::{types::Config, ConfigError, TemplateMode};
use crate::store::Channel;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Ticket source credentials are present
/// - Every sync channel has its generator section
/// - Bundle templates name a directory
/// - Mailer has a sender address
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let source = &config.ticket_source;
    for (name, value) in [
        ("ticket_source.base_url", &source.base_url),
        ("ticket_source.api_key", &source.api_key),
        ("ticket_source.event_id", &source.event_id),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    if config.sync.channels.is_empty() {
        return Err(ConfigError::ValidationError(
            "sync.channels must list at least one channel".to_string(),
        ));
    }
    if config.sync.run_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "sync.run_timeout_secs cannot be 0".to_string(),
        ));
    }

    for channel in &config.sync.channels {
        match channel {
            Channel::AppleWallet => {
                let apple = config.apple.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "sync.channels includes apple_wallet but [apple] is missing".to_string(),
                    )
                })?;
                if apple.certificate_path.is_none() && apple.certificate_base64.is_none() {
                    return Err(ConfigError::ValidationError(
                        "apple.certificate_path or apple.certificate_base64 must be set"
                            .to_string(),
                    ));
                }
                if apple.root_certificate_path.is_none()
                    && apple.root_certificate_base64.is_none()
                {
                    return Err(ConfigError::ValidationError(
                        "apple.root_certificate_path or apple.root_certificate_base64 must be set"
                            .to_string(),
                    ));
                }
                if apple.template == TemplateMode::Bundle && apple.template_dir.is_none() {
                    return Err(ConfigError::ValidationError(
                        "apple.template_dir is required when apple.template = \"bundle\""
                            .to_string(),
                    ));
                }
            }
            Channel::GoogleWallet => {
                let google = config.google.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "sync.channels includes google_wallet but [google] is missing"
                            .to_string(),
                    )
                })?;
                if google.issuer_email.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "google.issuer_email cannot be empty".to_string(),
                    ));
                }
            }
        }
    }

    if let Some(mailer) = &config.mailer {
        if mailer.from.trim().is_empty() || mailer.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mailer.host and mailer.from must be set".to_string(),
            ));
        }
    }

    Ok(())
}
