//! Server configuration read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `FLOWGRAPH_DB_PATH` | `flowgraph.db` |
//! | `FLOWGRAPH_PORT` | `3001` |
//! | `FLOWGRAPH_WORK_ROOT` | system temp dir |
//! | `PYTHON_CMD` | `python3` |
//! | `NODE_CMD` | `node` |
//! | `FLOWGRAPH_SETUP_TIMEOUT_SECS` | `20` |
//! | `FLOWGRAPH_GRAPH_MODE` | `runtime` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flowgraph_core::Language;

/// Invalid configuration values, reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// When the pipeline graph is recovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GraphMode {
    /// The uploaded program is instrumented and prints its own graph while
    /// it runs.
    #[default]
    Runtime,
    /// The host extracts the graph before upload; the program runs as
    /// written.
    Static,
}

impl fmt::Display for GraphMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphMode::Runtime => write!(f, "runtime"),
            GraphMode::Static => write!(f, "static"),
        }
    }
}

impl FromStr for GraphMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "runtime" => Ok(GraphMode::Runtime),
            "static" => Ok(GraphMode::Static),
            _ => Err("expected 'runtime' or 'static'".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Directory under which each session gets its own workspace.
    pub work_root: PathBuf,
    pub python_cmd: String,
    pub node_cmd: String,
    /// Bound on connecting to the worker and uploading files.
    pub setup_timeout: Duration,
    pub graph_mode: GraphMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: PathBuf::from("flowgraph.db"),
            port: 3001,
            work_root: std::env::temp_dir(),
            python_cmd: "python3".to_string(),
            node_cmd: "node".to_string(),
            setup_timeout: Duration::from_secs(20),
            graph_mode: GraphMode::Runtime,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`; unset or empty variables
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = ServerConfig::default();

        if let Some(path) = get("FLOWGRAPH_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(port) = get("FLOWGRAPH_PORT") {
            config.port = parse_var("FLOWGRAPH_PORT", &port)?;
        }
        if let Some(root) = get("FLOWGRAPH_WORK_ROOT") {
            config.work_root = PathBuf::from(root);
        }
        if let Some(cmd) = get("PYTHON_CMD") {
            config.python_cmd = cmd;
        }
        if let Some(cmd) = get("NODE_CMD") {
            config.node_cmd = cmd;
        }
        if let Some(secs) = get("FLOWGRAPH_SETUP_TIMEOUT_SECS") {
            let secs: u64 = parse_var("FLOWGRAPH_SETUP_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "FLOWGRAPH_SETUP_TIMEOUT_SECS",
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.setup_timeout = Duration::from_secs(secs);
        }
        if let Some(mode) = get("FLOWGRAPH_GRAPH_MODE") {
            config.graph_mode = parse_var("FLOWGRAPH_GRAPH_MODE", &mode)?;
        }
        Ok(config)
    }

    /// Interpreter used to launch an entry file of `language`.
    pub fn interpreter(&self, language: Language) -> &str {
        match language {
            Language::Python => &self.python_cmd,
            Language::JavaScript => &self.node_cmd,
        }
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
