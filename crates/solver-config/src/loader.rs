//! Loading with `${VAR}` environment substitution.

use crate::{Config, ConfigError};
use regex::Regex;
use std::env;
use std::path::Path;

/// Configuration loader with environment variable substitution
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		tracing::debug!(path = %file_path, "Reading configuration");
		let content = tokio::fs::read_to_string(file_path).await?;
		Self::parse(&content)
	}

	/// Substitutes, parses and validates configuration text.
	pub fn parse(content: &str) -> Result<Config, ConfigError> {
		let substituted = Self::substitute_env_vars(content)?;

		let config: Config =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		config.validate()?;
		Ok(config)
	}

	fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
		let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

		let mut result = content.to_string();
		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}
}
