use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9002;
pub const DEFAULT_LOG_FILENAME: &str = "facilitator.log";

/// Where the facilitator writes its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

/// Startup options, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilitatorConfig {
    pub host: String,
    pub port: u16,
    pub log: LogTarget,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port {0:?}")]
    BadPort(String),
    #[error("expected at most HOST and PORT, got {0} arguments")]
    TooManyArgs(usize),
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ADDRESS.to_owned(),
            port: DEFAULT_PORT,
            log: LogTarget::File(DEFAULT_LOG_FILENAME.into()),
        }
    }
}

impl FacilitatorConfig {
    /// Builds a config from `[HOST] [PORT]` positionals and the log flags.
    ///
    /// A single all-digit positional is taken as the port. An explicit log
    /// file wins over `debug`, which otherwise sends the log to stdout.
    pub fn from_args(
        positionals: &[String],
        debug: bool,
        log_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match positionals {
            [] => {}
            [one] if one.bytes().all(|b| b.is_ascii_digit()) => config.port = parse_port(one)?,
            [host] => config.host.clone_from(host),
            [host, port] => {
                config.host.clone_from(host);
                config.port = parse_port(port)?;
            }
            more => return Err(ConfigError::TooManyArgs(more.len())),
        }

        config.log = match (log_file, debug) {
            (Some(path), _) => LogTarget::File(path),
            (None, true) => LogTarget::Stdout,
            (None, false) => LogTarget::File(DEFAULT_LOG_FILENAME.into()),
        };

        Ok(config)
    }
}

fn parse_port(s: &str) -> Result<u16, ConfigError> {
    s.parse().map_err(|_| ConfigError::BadPort(s.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> { a.iter().map(ToString::to_string).collect() }

    #[test]
    fn defaults() {
        let config = FacilitatorConfig::from_args(&[], false, None).unwrap();
        assert_eq!(config, FacilitatorConfig::default());
    }

    #[test]
    fn single_positional_is_port_or_host() {
        let config = FacilitatorConfig::from_args(&args(&["8000"]), false, None).unwrap();
        assert_eq!((config.host.as_str(), config.port), (DEFAULT_ADDRESS, 8000));

        let config = FacilitatorConfig::from_args(&args(&["127.0.0.1"]), false, None).unwrap();
        assert_eq!((config.host.as_str(), config.port), ("127.0.0.1", DEFAULT_PORT));
    }

    #[test]
    fn host_and_port() {
        let config = FacilitatorConfig::from_args(&args(&["::", "80"]), false, None).unwrap();
        assert_eq!((config.host.as_str(), config.port), ("::", 80));
    }

    #[test]
    fn bad_arguments() {
        assert_eq!(
            FacilitatorConfig::from_args(&args(&["h", "http"]), false, None),
            Err(ConfigError::BadPort("http".into()))
        );
        assert_eq!(
            FacilitatorConfig::from_args(&args(&["99999"]), false, None),
            Err(ConfigError::BadPort("99999".into()))
        );
        assert_eq!(
            FacilitatorConfig::from_args(&args(&["a", "1", "b"]), false, None),
            Err(ConfigError::TooManyArgs(3))
        );
    }

    #[test]
    fn log_target() {
        let config = FacilitatorConfig::from_args(&[], true, None).unwrap();
        assert_eq!(config.log, LogTarget::Stdout);

        let config = FacilitatorConfig::from_args(&[], true, Some("x.log".into())).unwrap();
        assert_eq!(config.log, LogTarget::File("x.log".into()));
    }
}
