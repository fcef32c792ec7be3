//! Configuration of the `hgs` binary.
//!
//! | Source | Effect |
//! |--------|--------|
//! | `-D name=value` | bind `name` in the root scope before any script runs |
//! | `--prelude <file>` / `HGS_PRELUDE` / `<config dir>/prelude.hgs` | script run before the main one |
//! | `-t` | treat input as template text |
//! | `-v`, `-vv` | log at debug / trace level |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

use crate::script::{Context, Value};

/// Environment variable naming a prelude script.
pub const PRELUDE_ENV: &str = "HGS_PRELUDE";

/// File name of the prelude in the per-user config directory.
pub const PRELUDE_FILE: &str = "prelude.hgs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid definition '{0}': expected NAME=VALUE")]
    MalformedDefine(String),

    #[error("invalid variable name '{0}'")]
    InvalidName(String),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
pub struct Config {
    /// Script run in the root scope before the main input.
    pub prelude: Option<PathBuf>,
    /// `-D` definitions, in command-line order.
    pub defines: Vec<(String, Value)>,
    /// Parse input as template text instead of code.
    pub template: bool,
    /// Number of `-v` flags.
    pub verbosity: u8,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `NAME=VALUE` definition.
    pub fn define(&mut self, arg: &str) -> Result<&mut Self, ConfigError> {
        self.defines.push(parse_define(arg)?);
        Ok(self)
    }

    /// Bind all definitions into `ctx`; later ones win.
    pub fn apply(&self, ctx: &Context) {
        for (name, value) in &self.defines {
            ctx.set_var(name, value.clone());
        }
    }

    /// Log filter for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Split `NAME=VALUE` and type the value.
pub fn parse_define(arg: &str) -> Result<(String, Value), ConfigError> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedDefine(arg.to_owned()))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(ConfigError::InvalidName(name.to_owned()));
    }
    Ok((name.to_owned(), parse_value(value)))
}

/// Integer, then float, then boolean, else the text itself.
pub fn parse_value(text: &str) -> Value {
    let t = text.trim();
    if let Ok(n) = t.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(x) = t.parse::<f64>() {
        Value::Float(x)
    } else {
        match t {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Str(text.to_owned()),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Locate the prelude script.
///
/// Priority: explicit `--prelude` path → `HGS_PRELUDE` → `prelude.hgs` in the
/// per-user config directory.  The explicit path is returned even if it does
/// not exist, so reading it reports the problem; the others must exist.
pub fn find_prelude(explicit: Option<&Path>) -> Option<PathBuf> {
    let config_dir = ProjectDirs::from("", "", "hgs").map(|d| d.config_dir().to_path_buf());
    find_prelude_in(explicit, std::env::var_os(PRELUDE_ENV), config_dir)
}

fn find_prelude_in(
    explicit: Option<&Path>,
    env: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    env.map(PathBuf::from)
        .into_iter()
        .chain(config_dir.map(|d| d.join(PRELUDE_FILE)))
        .find(|p| p.exists())
}

/// Read a script file.
pub fn read_source(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
