use crate::config::types::{ChannelConfig, Config, FetchConfig, PolitenessConfig, RunConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch(&config.fetch)?;
    validate_politeness(&config.politeness)?;
    validate_run(&config.run)?;
    validate_output(&config.output)?;
    validate_channels(&config.channel)?;
    Ok(())
}

fn validate_fetch(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "base-delay-ms must be greater than 0".to_string(),
        ));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_politeness(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }
    Ok(())
}

fn validate_run(config: &RunConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    if config.max_new_items < 1 {
        return Err(ConfigError::Validation(
            "max-new-items must be >= 1".to_string(),
        ));
    }

    if config.existing_streak_break < 1 {
        return Err(ConfigError::Validation(
            "existing-streak-break must be >= 1".to_string(),
        ));
    }

    if config.detail_concurrency < 1 || config.detail_concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "detail-concurrency must be between 1 and 16, got {}",
            config.detail_concurrency
        )));
    }

    Ok(())
}

fn validate_output(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_channels(channels: &[ChannelConfig]) -> Result<(), ConfigError> {
    if channels.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[channel]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for channel in channels {
        if channel.id.is_empty() {
            return Err(ConfigError::Validation(
                "channel id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(channel.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate channel id '{}'",
                channel.id
            )));
        }

        if !channel.list_url.contains("{page}") {
            return Err(ConfigError::Validation(format!(
                "channel '{}': list-url must contain a {{page}} placeholder",
                channel.id
            )));
        }

        let substituted = channel.list_url.replace("{page}", "1");
        let parsed = Url::parse(&substituted).map_err(|error| {
            ConfigError::InvalidUrl(format!("channel '{}': {error}", channel.id))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "channel '{}': list-url must be http(s), got '{}'",
                channel.id,
                parsed.scheme()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::OutputConfig;

    fn valid_config() -> Config {
        Config {
            fetch: FetchConfig {
                max_attempts: 3,
                base_delay_ms: 1200,
                timeout_ms: 15000,
                user_agent: "tidemark-test/1.0".to_string(),
            },
            politeness: PolitenessConfig {
                min_delay_ms: 800,
                max_delay_ms: 1600,
                page_extra_ms: 500,
            },
            run: RunConfig {
                max_pages: 5,
                max_new_items: 50,
                existing_streak_break: 20,
                detail_concurrency: 1,
            },
            output: OutputConfig {
                database_path: "./tidemark.db".to_string(),
            },
            channel: vec![ChannelConfig {
                id: "alpha".to_string(),
                list_url: "https://example.com/board/lists/?id=alpha&page={page}".to_string(),
            }],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = valid_config();
        config.fetch.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let mut config = valid_config();
        config.politeness.min_delay_ms = 2000;
        config.politeness.max_delay_ms = 1000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_channels_rejected() {
        let mut config = valid_config();
        config.channel.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_channel_ids_rejected() {
        let mut config = valid_config();
        let dupe = config.channel[0].clone();
        config.channel.push(dupe);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_list_url_requires_page_placeholder() {
        let mut config = valid_config();
        config.channel[0].list_url = "https://example.com/board/lists/?page=1".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_list_url_must_be_absolute_http() {
        let mut config = valid_config();
        config.channel[0].list_url = "ftp://example.com/?page={page}".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_excessive_concurrency_rejected() {
        let mut config = valid_config();
        config.run.detail_concurrency = 64;
        assert!(validate(&config).is_err());
    }
}
