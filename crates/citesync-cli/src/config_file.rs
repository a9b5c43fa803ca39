//! Optional TOML file for the service tuning constants.
//!
//! All fields are optional so partial files work. Precedence is resolved
//! in [`Settings::resolve`]: an explicitly passed flag beats the file,
//! the file beats the built-in default. The matching tolerance and the
//! blocked-backoff constants are compatibility-sensitive tuning knobs, so
//! they are exposed here rather than baked in.

use std::path::Path;

use serde::Deserialize;

use citesync_core::ServiceConfig;
use citesync_scholar::{DEFAULT_SCHOLAR_URL, DEFAULT_TOLERANCE};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub delay_mins: Option<u64>,
    pub blocked_delay_mins: Option<u64>,
    pub jitter_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub tolerance: Option<f32>,
    pub endpoint: Option<String>,
}

/// Final tuning values after precedence resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub delay_mins: u64,
    pub blocked_delay_mins: u64,
    pub jitter_secs: u64,
    pub timeout_secs: u64,
    pub tolerance: f32,
    pub endpoint: String,
}

impl Settings {
    /// Merge explicitly passed flags over file values over defaults.
    ///
    /// Both layers arrive as [`ConfigFile`] (absent flag = `None`), so a
    /// flag the user actually typed always wins over the file.
    pub fn resolve(flags: ConfigFile, file: ConfigFile) -> Settings {
        let defaults = ServiceConfig::default();
        Settings {
            delay_mins: flags
                .delay_mins
                .or(file.delay_mins)
                .unwrap_or(defaults.refresh_delay.as_secs() / 60),
            blocked_delay_mins: flags
                .blocked_delay_mins
                .or(file.blocked_delay_mins)
                .unwrap_or(defaults.blocked_delay.as_secs() / 60),
            jitter_secs: flags
                .jitter_secs
                .or(file.jitter_secs)
                .unwrap_or(defaults.jitter.as_secs()),
            timeout_secs: flags
                .timeout_secs
                .or(file.timeout_secs)
                .unwrap_or(defaults.fetch_timeout.as_secs()),
            tolerance: flags
                .tolerance
                .or(file.tolerance)
                .unwrap_or(DEFAULT_TOLERANCE),
            endpoint: flags
                .endpoint
                .or(file.endpoint)
                .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string()),
        }
    }
}

pub fn load_from_path(path: &Path) -> anyhow::Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_parses() {
        let config: ConfigFile = toml::from_str("delay_mins = 30\ntolerance = 0.2\n").unwrap();
        assert_eq!(config.delay_mins, Some(30));
        assert_eq!(config.tolerance, Some(0.2));
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "blocked_delay_mins = 720").unwrap();
        let config = load_from_path(file.path()).unwrap();
        assert_eq!(config.blocked_delay_mins, Some(720));
    }

    #[test]
    fn test_unknown_file_errors() {
        assert!(load_from_path(Path::new("/no/such/citesync.toml")).is_err());
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let settings = Settings::resolve(ConfigFile::default(), ConfigFile::default());
        assert_eq!(settings.delay_mins, 18);
        assert_eq!(settings.blocked_delay_mins, 1800);
        assert_eq!(settings.jitter_secs, 2);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(settings.endpoint, DEFAULT_SCHOLAR_URL);
    }

    #[test]
    fn test_file_beats_default() {
        let file = ConfigFile {
            delay_mins: Some(45),
            endpoint: Some("http://proxy.local/scholar?q=".into()),
            ..ConfigFile::default()
        };
        let settings = Settings::resolve(ConfigFile::default(), file);
        assert_eq!(settings.delay_mins, 45);
        assert_eq!(settings.endpoint, "http://proxy.local/scholar?q=");
        // Untouched values fall back to defaults
        assert_eq!(settings.blocked_delay_mins, 1800);
    }

    #[test]
    fn test_explicit_flag_beats_file() {
        let flags = ConfigFile {
            delay_mins: Some(5),
            ..ConfigFile::default()
        };
        let file = ConfigFile {
            delay_mins: Some(45),
            tolerance: Some(0.25),
            ..ConfigFile::default()
        };
        let settings = Settings::resolve(flags, file);
        assert_eq!(settings.delay_mins, 5);
        // Values the user did not pass still come from the file
        assert_eq!(settings.tolerance, 0.25);
    }
}
