//=============================================
// joss/config.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime configuration
// Objective: Runtime options from joss.toml and process environment, plus the
//            env.joss KEY=VALUE loader that feeds the script environment
//=============================================

//=============================================
//            Section 1: Runtime Options
//=============================================

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;
pub const CONFIG_FILE_NAME: &str = "joss.toml";
pub const ENV_FILE_NAME: &str = "env.joss";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Interpreter knobs. Every field has a default so partial config files work.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    pub trace: bool,
    /// Skip console reads; `cin >>` assigns an empty string.
    pub non_interactive: bool,
    /// Permit `System::Run` to spawn processes.
    pub allow_system_run: bool,
    pub max_call_depth: usize,
    /// Directory used to resolve imports of the entry script.
    pub base_dir: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            trace: false,
            non_interactive: false,
            allow_system_run: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            base_dir: None,
            env_file: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    runtime: RuntimeOptions,
}

impl RuntimeOptions {
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_non_interactive(mut self, non_interactive: bool) -> Self {
        self.non_interactive = non_interactive;
        self
    }

    pub fn with_allow_system_run(mut self, allow: bool) -> Self {
        self.allow_system_run = allow;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth.max(1);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    //Function: load
    //Purpose: Read options from an explicit or discovered joss.toml, then apply
    //         NON_INTERACTIVE / ALLOW_SYSTEM_RUN from the process environment
    //Inputs: path: Option<&Path>, search_dir: &Path
    //Returns: Result<RuntimeOptions, ConfigError>
    pub fn load(path: Option<&Path>, search_dir: &Path) -> Result<Self, ConfigError> {
        let candidate = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let discovered = search_dir.join(CONFIG_FILE_NAME);
                discovered.is_file().then_some(discovered)
            }
        };

        let mut options = match candidate {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        options.apply_process_env();
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded runtime configuration");
        Ok(file.runtime)
    }

    fn apply_process_env(&mut self) {
        if let Ok(value) = std::env::var("NON_INTERACTIVE") {
            self.non_interactive = is_truthy_flag(&value);
        }
        if let Ok(value) = std::env::var("ALLOW_SYSTEM_RUN") {
            self.allow_system_run = is_truthy_flag(&value);
        }
    }
}

pub fn is_truthy_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes")
}

//=============================================/*
//  Precedence: defaults < joss.toml < process environment < CLI flags.
//============================================*/
//=============================================
//            Section 2: Script Environment Files
//=============================================

/// Parse `KEY=VALUE` lines; `#` starts a comment line, surrounding quotes are
/// stripped from values.
pub fn parse_env_file(text: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        env.insert(key.trim().to_string(), value.to_string());
    }
    env
}

pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_env_file(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_file_skips_comments_and_strips_quotes() {
        let env = parse_env_file(
            "# database\nDB_HOST=\"localhost\"\nAPP_NAME='Joss'\n\nDEBUG = true\nbroken line\n",
        );
        assert_eq!(env.get("DB_HOST").map(String::as_str), Some("localhost"));
        assert_eq!(env.get("APP_NAME").map(String::as_str), Some("Joss"));
        assert_eq!(env.get("DEBUG").map(String::as_str), Some("true"));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let file: ConfigFile =
            toml::from_str("[runtime]\nmax_call_depth = 64\n").expect("valid toml");
        assert_eq!(file.runtime.max_call_depth, 64);
        assert!(!file.runtime.non_interactive);
    }

    #[test]
    fn config_file_is_discovered_in_search_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[runtime]\ntrace = true\n",
        )
        .expect("write config");
        let options = RuntimeOptions::from_file(&dir.path().join(CONFIG_FILE_NAME))
            .expect("load config");
        assert!(options.trace);
    }
}
