use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::clock::DEFAULT_POLL_INTERVAL;
use crate::pacer::Delays;
use crate::paths::{ScriptLocator, is_plain_file_name};

const CONFIG_FILENAME: &str = "config.toml";

/// Delay table in seconds, as written in `config.toml`.
///
/// ```toml
/// [delays]
/// spawn_secs = 0.4
/// data_secs = 0.2
/// default_secs = 0.12   # 0 = yield one step instead of sleeping
/// ```
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct DelaySettings {
    #[serde(default = "default_spawn_secs")]
    pub spawn_secs: f64,
    #[serde(default = "default_data_secs")]
    pub data_secs: f64,
    #[serde(default = "default_command_secs")]
    pub default_secs: f64,
}

fn default_spawn_secs() -> f64 {
    0.4
}

fn default_data_secs() -> f64 {
    0.2
}

fn default_command_secs() -> f64 {
    0.12
}

fn default_scripts_subdir() -> String {
    "scripts".to_string()
}

fn default_scripts_extension() -> String {
    "txt".to_string()
}

fn default_poll_interval_millis() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_execution_log() -> bool {
    true
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            spawn_secs: default_spawn_secs(),
            data_secs: default_data_secs(),
            default_secs: default_command_secs(),
        }
    }
}

impl DelaySettings {
    pub fn to_delays(&self) -> Result<Delays> {
        Ok(Delays {
            spawn: parse_delay_secs(self.spawn_secs).context("invalid delays.spawn_secs")?,
            data: parse_delay_secs(self.data_secs).context("invalid delays.data_secs")?,
            default: parse_delay_secs(self.default_secs)
                .context("invalid delays.default_secs")?,
        })
    }
}

/// Convert a delay in seconds, rejecting negative and non-finite values.
pub fn parse_delay_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() {
        bail!("delay must be a finite number of seconds, got {secs}");
    }
    if secs < 0.0 {
        bail!("delay must not be negative, got {secs}");
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("delay out of range: {secs}"))
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScriptsConfig {
    /// Sub-directory of the config root searched before the root itself.
    #[serde(default = "default_scripts_subdir")]
    pub subdir: String,
    /// Extension used when listing completion candidates.
    #[serde(default = "default_scripts_extension")]
    pub extension: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            subdir: default_scripts_subdir(),
            extension: default_scripts_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HostConfig {
    /// Default tmux pane target, e.g. `server:0.0`.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "default_poll_interval_millis")]
    pub poll_interval_millis: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            target: None,
            poll_interval_millis: default_poll_interval_millis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogConfig {
    /// Append a JSON-lines record of every run under `<root>/logs/`.
    #[serde(default = "default_execution_log")]
    pub execution_log: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            execution_log: default_execution_log(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ExecConfig {
    #[serde(default)]
    pub delays: DelaySettings,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ExecConfig {
    /// Load `<root>/config.toml`. Returns the default config if the file is
    /// absent. Either way the result is validated.
    pub fn load(root: &Path) -> Result<(Self, Option<PathBuf>)> {
        let path = root.join(CONFIG_FILENAME);
        let (config, source) = if path.is_file() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: ExecConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            (config, Some(path))
        } else {
            (ExecConfig::default(), None)
        };

        config.validate().with_context(|| match &source {
            Some(p) => format!("invalid configuration in {}", p.display()),
            None => "invalid default configuration".to_string(),
        })?;
        Ok((config, source))
    }

    pub fn validate(&self) -> Result<()> {
        self.delays.to_delays()?;
        if !is_plain_file_name(&self.scripts.subdir) {
            bail!(
                "scripts.subdir must be a single directory name, got '{}'",
                self.scripts.subdir
            );
        }
        if self.scripts.extension.trim_start_matches('.').is_empty() {
            bail!("scripts.extension must not be empty");
        }
        if self.host.poll_interval_millis == 0 {
            bail!("host.poll_interval_millis must be greater than zero");
        }
        Ok(())
    }

    pub fn delays(&self) -> Result<Delays> {
        self.delays.to_delays()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.host.poll_interval_millis)
    }

    pub fn locator(&self, root: &Path) -> ScriptLocator {
        ScriptLocator::new(root, &self.scripts.subdir, &self.scripts.extension)
    }

    pub fn execution_log_path(&self, root: &Path) -> Option<PathBuf> {
        self.log
            .execution_log
            .then(|| root.join("logs").join("execution.jsonl"))
    }
}
