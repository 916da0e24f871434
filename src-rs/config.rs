//! Settings read from `TERM_CAPTURE_*` environment variables.

use crate::logging::{LogConfig, LogFormat};
use std::env;
use std::time::Duration;
use tracing::warn;

pub const ENV_TMUX: &str = "TERM_CAPTURE_TMUX";
pub const ENV_SOCKET: &str = "TERM_CAPTURE_SOCKET";
pub const ENV_TIMEOUT_MS: &str = "TERM_CAPTURE_TIMEOUT_MS";
pub const ENV_LOG: &str = "TERM_CAPTURE_LOG";
pub const ENV_LOG_FORMAT: &str = "TERM_CAPTURE_LOG_FORMAT";

pub const DEFAULT_TMUX: &str = "tmux";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub tmux_bin: String,
    /// tmux server socket name, passed as `-L`.
    pub socket: Option<String>,
    pub timeout: Duration,
    pub log: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tmux_bin: DEFAULT_TMUX.to_string(),
            socket: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            log: LogConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as
    /// unset; values that fail to parse keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut settings = Self::default();

        if let Some(bin) = get(ENV_TMUX) {
            settings.tmux_bin = bin;
        }
        settings.socket = get(ENV_SOCKET);

        if let Some(raw) = get(ENV_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => settings.timeout = Duration::from_millis(ms),
                _ => warn!(
                    key = ENV_TIMEOUT_MS,
                    value = %raw,
                    default_ms = DEFAULT_TIMEOUT_MS,
                    "ignoring invalid timeout"
                ),
            }
        }

        if let Some(level) = get(ENV_LOG) {
            settings.log.level = level;
        }
        if let Some(raw) = get(ENV_LOG_FORMAT) {
            match raw.parse::<LogFormat>() {
                Ok(format) => settings.log.format = format,
                Err(err) => warn!(key = ENV_LOG_FORMAT, error = %err, "ignoring log format"),
            }
        }

        settings
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        socket: Option<String>,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
    ) -> Self {
        if socket.is_some() {
            self.socket = socket;
        }
        if let Some(level) = log_level {
            self.log.level = level;
        }
        if let Some(format) = log_format {
            self.log.format = format;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        assert_eq!(settings(&[]), Settings::default());
        assert_eq!(Settings::default().timeout, Duration::from_millis(5000));
    }

    #[test]
    fn environment_values_are_read() {
        let s = settings(&[
            (ENV_TMUX, "/opt/bin/tmux"),
            (ENV_SOCKET, "agents"),
            (ENV_TIMEOUT_MS, "750"),
            (ENV_LOG, "debug"),
            (ENV_LOG_FORMAT, "json"),
        ]);
        assert_eq!(s.tmux_bin, "/opt/bin/tmux");
        assert_eq!(s.socket.as_deref(), Some("agents"));
        assert_eq!(s.timeout, Duration::from_millis(750));
        assert_eq!(s.log.level, "debug");
        assert_eq!(s.log.format, LogFormat::Json);
    }

    #[test]
    fn blank_and_invalid_values_fall_back() {
        let s = settings(&[
            (ENV_SOCKET, "   "),
            (ENV_TIMEOUT_MS, "soon"),
            (ENV_LOG_FORMAT, "yaml"),
        ]);
        assert_eq!(s.socket, None);
        assert_eq!(s.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(s.log.format, LogFormat::Pretty);
        assert_eq!(settings(&[(ENV_TIMEOUT_MS, "0")]).timeout, Duration::from_millis(5000));
    }

    #[test]
    fn cli_overrides_win() {
        let s = settings(&[(ENV_SOCKET, "env-sock"), (ENV_LOG, "info")]).with_overrides(
            Some("cli-sock".to_string()),
            None,
            Some(LogFormat::Json),
        );
        assert_eq!(s.socket.as_deref(), Some("cli-sock"));
        assert_eq!(s.log.level, "info");
        assert_eq!(s.log.format, LogFormat::Json);
    }
}
