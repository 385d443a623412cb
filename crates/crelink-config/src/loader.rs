//! Multi-file configuration loading.
//!
//! A root file may pull in other files with `include`. Top-level sections
//! must be unique across the whole set; the merged table is validated as
//! one [`Config`].

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a root configuration file together with its includes.
pub struct ConfigLoader {
	/// Base directory for relative include paths.
	base_path: PathBuf,
	/// Canonical paths already read; a repeat means an include cycle.
	loaded_files: HashSet<PathBuf>,
	/// File each top-level section came from, for error messages.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads, merges and validates the configuration rooted at `config_path`.
	pub async fn load_config(&mut self, config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let content = self.read(&config_path).await?;
		let mut root: toml::Value = toml::from_str(&content)?;

		let includes = extract_includes(&root)?;
		if includes.is_empty() {
			return content.parse();
		}

		if let Some(table) = root.as_table_mut() {
			table.remove("include");
			for key in table.keys() {
				self.section_sources.insert(key.clone(), config_path.clone());
			}
		}

		for include in includes {
			let path = self.resolve_path(&include)?;
			let included: toml::Value = toml::from_str(&self.read(&path).await?)?;
			self.merge(&mut root, included, &path)?;
		}

		let merged = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		merged.parse()
	}

	/// Reads a file once, resolving environment variables.
	async fn read(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}
		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn merge(
		&mut self,
		root: &mut toml::Value,
		included: toml::Value,
		source: &Path,
	) -> Result<(), ConfigError> {
		let toml::Value::Table(included) = included else {
			return Ok(());
		};
		if included.contains_key("include") {
			return Err(ConfigError::Validation(format!(
				"Nested include in {} is not supported",
				source.display()
			)));
		}
		let Some(root) = root.as_table_mut() else {
			return Ok(());
		};
		for (key, value) in included {
			if let Some(existing) = self.section_sources.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources.insert(key.clone(), source.to_path_buf());
			root.insert(key, value);
		}
		Ok(())
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};
		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// `include` accepts a single path or an array of paths.
fn extract_includes(root: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match root.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("crelink.toml"),
			"[wallet]\ndefault_chain_id = 1\n[switch]\nhistory_size = 10\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let config = loader.load_config("crelink.toml").await.unwrap();
		assert_eq!(config.wallet.default_chain_id, 1);
		assert_eq!(config.switch.history_size, 10);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			"include = [\"networks.toml\", \"bridge.toml\"]\n[wallet]\ndefault_chain_id = 1000\n",
		)
		.unwrap();
		fs::write(
			dir.path().join("networks.toml"),
			"[networks.1000]\nrpc_url = \"http://localhost:8545\"\n",
		)
		.unwrap();
		fs::write(
			dir.path().join("bridge.toml"),
			"[bridge]\nexpiry_seconds = 120\n[bridge.implementations.lock_mint]\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let config = loader.load_config("main.toml").await.unwrap();
		assert_eq!(
			config.networks[&1000].rpc_url.as_deref(),
			Some("http://localhost:8545")
		);
		assert_eq!(config.bridge.expiry_seconds, 120);
		assert!(config.bridge.implementations.contains_key("lock_mint"));
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			"include = \"dup.toml\"\n[switch]\nauto_switch = true\n",
		)
		.unwrap();
		fs::write(dir.path().join("dup.toml"), "[switch]\nauto_switch = false\n").unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let error = loader.load_config("main.toml").await.unwrap_err().to_string();
		assert!(error.contains("Duplicate section 'switch'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("self.toml"),
			"include = [\"self.toml\"]\n[wallet]\ndefault_chain_id = 1\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let error = loader.load_config("self.toml").await.unwrap_err().to_string();
		assert!(error.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("main.toml"), "include = [\"absent.toml\"]\n").unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let error = loader.load_config("main.toml").await.unwrap_err().to_string();
		assert!(error.contains("not found"));
	}
}
