use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::ClikitError;
use crate::process::{DEFAULT_SHELL, DEFAULT_TIMEOUT};

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClikitConfig {
    /// Completion barrier deadline for every invocation.
    pub timeout_ms: Option<u64>,
    /// Log each command before running it and its output afterwards.
    pub echo_commands: Option<bool>,
    /// Mirror child output to the terminal while capturing it.
    pub passthrough: Option<bool>,
    /// Shell used for shell-mode requests.
    pub shell: Option<String>,
}

impl ClikitConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn echo_commands(&self) -> bool {
        self.echo_commands.unwrap_or(false)
    }

    pub fn passthrough(&self) -> bool {
        self.passthrough.unwrap_or(true)
    }

    pub fn shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(DEFAULT_SHELL)
    }

    fn validate(self, path: &Path) -> Result<Self, ClikitError> {
        let invalid = |message: &str| ClikitError::ConfigInvalid {
            path: path.to_path_buf(),
            message: message.to_string(),
        };
        if self.timeout_ms == Some(0) {
            return Err(invalid("timeoutMs must be greater than zero"));
        }
        if self.shell.as_deref().is_some_and(|shell| shell.trim().is_empty()) {
            return Err(invalid("shell must not be empty"));
        }
        Ok(self)
    }
}

pub fn find_repo_root(start: &Path) -> PathBuf {
    git2::Repository::discover(start)
        .ok()
        .and_then(|repo| repo.workdir().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| start.to_path_buf())
}

pub fn discover_config_path(repo_root: &Path) -> Option<PathBuf> {
    let names = [
        "clikit.toml",
        "clikit.config.json",
        "clikit.config.json5",
        "clikit.config.yaml",
        "clikit.config.yml",
        ".clikitrc",
        ".clikitrc.json",
        ".clikitrc.yaml",
        ".clikitrc.yml",
    ];
    names
        .into_iter()
        .map(|name| repo_root.join(name))
        .find(|p| p.is_file())
}

pub fn load_clikit_config(repo_root: &Path) -> Result<ClikitConfig, ClikitError> {
    if let Some(path) = discover_config_path(repo_root) {
        return load_clikit_config_from_path(&path);
    }

    let cargo_toml_path = repo_root.join("Cargo.toml");
    if cargo_toml_path.is_file() {
        if let Some(config) =
            load_toml_config(&cargo_toml_path, TomlConfigSource::CargoPackageMetadata)?
        {
            return config.validate(&cargo_toml_path);
        }
    }

    Ok(ClikitConfig::default())
}

pub fn load_clikit_config_from_path(path: &Path) -> Result<ClikitConfig, ClikitError> {
    let ext = path
        .extension()
        .and_then(|x| x.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let config = match ext.as_str() {
        // `.clikitrc` without an extension is JSON.
        "" | "json" | "json5" => load_json_config(path)?,
        "yaml" | "yml" => load_yaml_config(path)?,
        "toml" => load_toml_config(path, TomlConfigSource::FullFile)?.unwrap_or_default(),
        _ => ClikitConfig::default(),
    };
    config.validate(path)
}

fn read_config_file(path: &Path) -> Result<String, ClikitError> {
    std::fs::read_to_string(path).map_err(|source| ClikitError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_json_config(path: &Path) -> Result<ClikitConfig, ClikitError> {
    let raw = read_config_file(path)?;
    json5::from_str::<ClikitConfig>(&raw)
        .or_else(|_| serde_json::from_str::<ClikitConfig>(&raw))
        .map_err(|err| ClikitError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn load_yaml_config(path: &Path) -> Result<ClikitConfig, ClikitError> {
    let raw = read_config_file(path)?;
    if raw.trim().is_empty() {
        return Ok(ClikitConfig::default());
    }
    serde_yaml::from_str::<ClikitConfig>(&raw).map_err(|err| ClikitError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TomlConfigSource {
    FullFile,
    CargoPackageMetadata,
}

fn load_toml_config(
    path: &Path,
    source: TomlConfigSource,
) -> Result<Option<ClikitConfig>, ClikitError> {
    let raw = read_config_file(path)?;

    let toml_value =
        toml::from_str::<toml::Value>(&raw).map_err(|err| ClikitError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    let maybe_table_value = match source {
        TomlConfigSource::FullFile => Some(toml_value),
        TomlConfigSource::CargoPackageMetadata => {
            extract_cargo_package_metadata_clikit(&toml_value)
        }
    };

    let Some(table_value) = maybe_table_value else {
        return Ok(None);
    };

    let json_value =
        serde_json::to_value(table_value).map_err(|err| ClikitError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let normalized = normalize_toml_keys_to_camel_case(&json_value);

    serde_json::from_value::<ClikitConfig>(normalized)
        .map(Some)
        .map_err(|err| ClikitError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn extract_cargo_package_metadata_clikit(value: &toml::Value) -> Option<toml::Value> {
    value
        .as_table()
        .and_then(|root| root.get("package"))
        .and_then(|package| package.as_table())
        .and_then(|package_table| package_table.get("metadata"))
        .and_then(|metadata| metadata.as_table())
        .and_then(|metadata_table| metadata_table.get("clikit"))
        .cloned()
}

fn normalize_toml_keys_to_camel_case(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(object) => JsonValue::Object(
            object
                .iter()
                .map(|(key, value)| {
                    (
                        normalize_toml_key(key),
                        normalize_toml_keys_to_camel_case(value),
                    )
                })
                .collect(),
        ),
        JsonValue::Array(array) => JsonValue::Array(
            array
                .iter()
                .map(normalize_toml_keys_to_camel_case)
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `timeout_ms` and `timeout-ms` both become `timeoutMs`.
pub(crate) fn normalize_toml_key(key: &str) -> String {
    if !key.contains(['_', '-']) {
        return key.to_string();
    }

    let mut segments = key.split(['_', '-']).filter(|segment| !segment.is_empty());
    let Some(first_segment) = segments.next() else {
        return key.to_string();
    };

    let mut normalized_key = String::from(first_segment);
    for segment in segments {
        let mut chars = segment.chars();
        let Some(first_char) = chars.next() else {
            continue;
        };
        normalized_key.push(first_char.to_ascii_uppercase());
        normalized_key.extend(chars);
    }
    normalized_key
}
