//! Front-end configuration that extends the base `Config` from core.
//!
//! This configuration includes:
//! - All engine options from `q9_core::Config` (flattened via serde)
//! - Global capture settings (helper command, device, grab)
//! - Text injection strategy
//! - Shutdown timing
//!
//! # Example
//!
//! ```toml
//! dataset_path = "data/q9.redb"
//! input_scheme = "numpad"
//! global_capture = true
//! helper_command = ["sudo", "/usr/local/bin/q9", "hook-helper"]
//! inject_strategy = "paste"
//! ```
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// How emitted text reaches the focused application on X11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectStrategy {
    /// `xdotool type`
    #[default]
    Type,
    /// Put the text on the clipboard and send ctrl+v
    Paste,
}

/// Configuration of the `q9` binary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine configuration
    #[serde(flatten)]
    pub base: q9_core::Config,

    /// Install a global capture backend at startup
    pub global_capture: bool,

    /// Command line that starts the privileged device helper (Linux). Empty
    /// means `sudo <this executable> hook-helper`. The helper runs in its own
    /// process group and cannot prompt on the terminal, so the launcher needs
    /// cached or passwordless credentials (or a graphical agent like `pkexec`).
    pub helper_command: Vec<String>,

    /// Keyboard device passed to the helper instead of auto-discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_path: Option<PathBuf>,

    /// Ask the helper for an exclusive grab of the keyboard
    pub grab_device: bool,

    pub inject_strategy: InjectStrategy,

    /// Upper bound for stopping capture threads and the helper process
    pub shutdown_timeout_ms: u64,

    /// Log emissions instead of injecting them
    pub dry_run: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base: q9_core::Config::default(),
            global_capture: true,
            helper_command: Vec::new(),
            device_path: None,
            grab_device: true,
            inject_strategy: InjectStrategy::Type,
            shutdown_timeout_ms: 2000,
            dry_run: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` when it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "loading config");
            Self::load_toml(path)
        } else {
            info!(path = %path.display(), "config not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Helper argv, filling in the default launcher when none is configured.
    pub fn helper_argv(&self) -> Vec<String> {
        let mut argv = if self.helper_command.is_empty() {
            let exe = std::env::current_exe()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "q9".to_string());
            vec!["sudo".to_string(), exe, "hook-helper".to_string()]
        } else {
            self.helper_command.clone()
        };
        if let Some(device) = &self.device_path {
            argv.push("--device".to_string());
            argv.push(device.display().to_string());
        }
        if !self.grab_device {
            argv.push("--no-grab".to_string());
        }
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_base_fields_parse() {
        let cfg: AppConfig = toml::from_str(
            "dataset_path = \"/tmp/x.redb\"\ninput_scheme = \"letters\"\ninject_strategy = \"paste\"\n",
        )
        .unwrap();
        assert_eq!(cfg.base.dataset_path, PathBuf::from("/tmp/x.redb"));
        assert_eq!(cfg.base.input_scheme, q9_core::InputScheme::Letters);
        assert_eq!(cfg.inject_strategy, InjectStrategy::Paste);
        assert!(cfg.global_capture);
    }

    #[test]
    fn helper_argv_appends_device_options() {
        let cfg = AppConfig {
            helper_command: vec!["pkexec".into(), "q9".into(), "hook-helper".into()],
            device_path: Some(PathBuf::from("/dev/input/event3")),
            grab_device: false,
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.helper_argv(),
            vec!["pkexec", "q9", "hook-helper", "--device", "/dev/input/event3", "--no-grab"]
        );
    }

    #[test]
    fn default_helper_runs_through_sudo() {
        let argv = AppConfig::default().helper_argv();
        assert_eq!(argv.first().map(String::as_str), Some("sudo"));
        assert_eq!(argv.last().map(String::as_str), Some("hook-helper"));
    }
}
