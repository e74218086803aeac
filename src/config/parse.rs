use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use regex::Regex;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate config from a YAML string
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Credentials are usually supplied through the environment
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    config.checkpoint.path = expand_tilde(&config.checkpoint.path);
    if let SinkConfig::File { path } = &mut config.sink {
        *path = expand_tilde(path);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);
    validate_ingest(&config.ingest, &mut errors);

    if config.checkpoint.key.trim().is_empty() {
        errors.push("checkpoint.key cannot be empty".to_string());
    }
    if config.checkpoint.path.as_os_str().is_empty() {
        errors.push("checkpoint.path cannot be empty".to_string());
    }

    match &config.sink {
        SinkConfig::Stdout => {}
        SinkConfig::File { path } => {
            if path.as_os_str().is_empty() {
                errors.push("sink.path cannot be empty".to_string());
            }
        }
        SinkConfig::Webhook { url, .. } => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("sink.url must be an http(s) URL, got '{}'", url));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.domain.trim().is_empty() {
        errors.push("source.domain cannot be empty".to_string());
    } else if source.domain.contains("://") || source.domain.contains('/') {
        errors.push(format!(
            "source.domain must be a bare host name (e.g. tenant.example.com), got '{}'",
            source.domain
        ));
    }

    if source.client_id.trim().is_empty() {
        errors.push("source.client_id cannot be empty".to_string());
    }
    if source.client_secret.trim().is_empty() {
        errors.push("source.client_secret cannot be empty".to_string());
    }
    if source.page_size == 0 {
        errors.push("source.page_size must be greater than zero".to_string());
    }
    if source.timeout.is_zero() {
        errors.push("source.timeout must be greater than zero".to_string());
    }
    if let Some(url) = &source.api_base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!("source.api_base_url must be an http(s) URL, got '{}'", url));
        }
    }
}

fn validate_ingest(ingest: &IngestSettings, errors: &mut Vec<String>) {
    if ingest.max_run_time.is_zero() {
        errors.push("ingest.max_run_time must be greater than zero".to_string());
    }
    if ingest.batch_size == 0 {
        errors.push("ingest.batch_size must be greater than zero".to_string());
    }
}
