//! Optional `key = value` file supplying defaults for the CLI flags.
//!
//! ```text
//! # ~/.config/capcache/config.toml
//! cache_dir = "/srv/captures"
//! concurrency = 20
//! max_retries = 3
//! retry_failed = false
//! verbosity = "verbose"   # default | verbose | quiet | debug
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

const APP_DIR: &str = "capcache";
const CONFIG_FILE: &str = "config.toml";

/// Values read from the config file; `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub cache_dir: Option<PathBuf>,
    pub concurrency: Option<u8>,
    pub max_retries: Option<u8>,
    pub retry_failed: Option<bool>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Applies the same ranges as the command line.
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.concurrency
            && !(1..=100).contains(&value)
        {
            bail!("`concurrency` must be within 1..=100, got {value}");
        }
        if let Some(value) = self.max_retries
            && value > 10
        {
            bail!("`max_retries` must be within 0..=10, got {value}");
        }
        Ok(())
    }

    fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "cache_dir" => self.cache_dir = Some(PathBuf::from(unquote(raw)?)),
            "concurrency" => self.concurrency = Some(small_int(raw)?),
            "max_retries" => self.max_retries = Some(small_int(raw)?),
            "retry_failed" => self.retry_failed = Some(flag(raw)?),
            "verbosity" => self.verbosity = Some(VerbositySetting::from_label(unquote(raw)?)?),
            other => bail!("Unknown configuration key: '{other}'"),
        }
        Ok(())
    }
}

/// Logging level a config file may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    fn from_label(label: &str) -> Result<Self> {
        Ok(match label {
            "default" => Self::Default,
            "verbose" => Self::Verbose,
            "quiet" => Self::Quiet,
            "debug" => Self::Debug,
            _ => bail!("unknown verbosity '{label}' (default, verbose, quiet or debug)"),
        })
    }
}

/// Where the config came from and what it held.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File that was (or would have been) read.
    pub path: Option<PathBuf>,
    pub config: Option<FileConfig>,
}

/// `$XDG_CONFIG_HOME/capcache/config.toml`, else
/// `$HOME/.config/capcache/config.toml`.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    let base = non_empty_var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty_var("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join(APP_DIR).join(CONFIG_FILE))
}

fn non_empty_var(name: &str) -> Option<OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Reads `explicit` if given (it must exist), else the default file if it
/// exists.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let (path, required) = match explicit {
        Some(path) => (Some(path.to_path_buf()), true),
        None => (resolve_default_config_path(), false),
    };

    let config = match path.as_deref() {
        Some(path) if required || path.exists() => Some(read_config(path)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse_config(text: &str) -> Result<FileConfig> {
    let mut config = FileConfig::default();
    for (number, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        let line = without_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| anyhow!("line {number}: expected `key = value`"))?;
        config
            .set(key.trim(), value.trim())
            .with_context(|| format!("line {number}: bad `{}`", key.trim()))?;
    }
    config.validate()?;
    Ok(config)
}

/// Cuts a `#` comment unless the `#` sits inside a quoted string.
fn without_comment(line: &str) -> &str {
    let mut quoted = false;
    for (at, ch) in line.char_indices() {
        if ch == '"' {
            quoted = !quoted;
        } else if ch == '#' && !quoted {
            return &line[..at];
        }
    }
    line
}

fn unquote(raw: &str) -> Result<&str> {
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| anyhow!("expected a double-quoted string, got {raw}"))
}

fn small_int(raw: &str) -> Result<u8> {
    raw.parse::<u8>()
        .map_err(|e| anyhow!("expected an integer 0..=255, got {raw}: {e}"))
}

fn flag(raw: &str) -> Result<bool> {
    raw.parse::<bool>()
        .map_err(|_| anyhow!("expected true or false, got {raw}"))
}
