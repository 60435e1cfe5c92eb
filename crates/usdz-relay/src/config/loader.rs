use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const SUPPORTED_VERSION: &str = "1.0";

/// Loads a config file. Relative paths inside it are resolved against the
/// directory containing the file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = load_config_from_str(&content)?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);

    Ok(config)
}

/// Parses and validates a config. Relative paths are left untouched.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.converter.script.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "converter.script must not be empty".to_string(),
        });
    }

    validate_suffix("output_suffix", &config.output_suffix)?;

    if config.publish_directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "publish_directory must not be empty".to_string(),
        });
    }

    if let Some(post) = &config.post_process {
        if post.script.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "post_process.script must not be empty".to_string(),
            });
        }
    }

    if let Some(preview) = &config.preview {
        if preview.program.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "preview.program must not be empty".to_string(),
            });
        }
        validate_suffix("preview.suffix", &preview.suffix)?;
    }

    if tracing_subscriber::EnvFilter::try_new(&config.log_level).is_err() {
        return Err(ConfigError::Validation {
            message: format!("Invalid log_level: {}", config.log_level),
        });
    }

    Ok(())
}

fn validate_suffix(field: &str, suffix: &str) -> Result<(), ConfigError> {
    let valid = suffix.len() > 1
        && suffix.starts_with('.')
        && suffix[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            message: format!("{} must look like '.ext', got '{}'", field, suffix),
        })
    }
}
