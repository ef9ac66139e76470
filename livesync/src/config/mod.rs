//! Environment-sourced configuration.
//!
//! Every value is read through a lookup function so the parsing can be
//! exercised without touching the process environment. Blank values count as
//! unset; unparseable numbers fall back to their defaults and are reported in
//! [`AppConfig::warnings`] so they can be logged once logging is up.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::PollTarget;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:livesync.db?mode=rwc";
pub const DEFAULT_LOG_FILTER: &str = "livesync=info,graph_api=info,sqlx=warn,tower_http=info";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_AUTH_BACKOFF: Duration = Duration::from_secs(600);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Set when records live behind a PostgREST (Supabase) endpoint instead of SQLite.
    pub postgrest: Option<PostgrestSettings>,
    pub api: ApiSettings,
    pub facebook: FacebookSettings,
    pub poller: PollerTiming,
    pub shutdown_timeout: Duration,
    pub logging: LoggingSettings,
    /// Problems found while parsing, e.g. a non-numeric interval.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PostgrestSettings {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub bind_address: String,
    pub port: u16,
    /// Allowed CORS origin for browser clients.
    pub frontend_url: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            frontend_url: None,
        }
    }
}

/// Facebook credentials, targets and association defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacebookSettings {
    pub poll_user_token: Option<String>,
    pub poll_user_id: Option<String>,
    pub default_group_id: Option<String>,
    pub default_class_id: Option<String>,
    pub webhook_verify_token: Option<String>,
    pub app_secret: Option<String>,
    pub graph_base_url: String,
    pub graph_api_version: String,
}

/// Credentials and target the poller needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCredentials {
    pub access_token: String,
    pub target: PollTarget,
}

/// Why the poller stays disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPollConfig {
    AccessToken,
    Target,
}

impl std::fmt::Display for MissingPollConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingPollConfig::AccessToken => f.write_str("FACEBOOK_POLL_USER_TOKEN not set"),
            MissingPollConfig::Target => {
                f.write_str("neither FACEBOOK_DEFAULT_GROUP_ID nor FACEBOOK_POLL_USER_ID set")
            }
        }
    }
}

impl FacebookSettings {
    /// Resolve what the poller should poll. The default group wins over the
    /// token owner's own timeline.
    pub fn poll_credentials(&self) -> Result<PollCredentials, MissingPollConfig> {
        let access_token = self
            .poll_user_token
            .clone()
            .ok_or(MissingPollConfig::AccessToken)?;

        let target = match (&self.default_group_id, &self.poll_user_id) {
            (Some(group), _) => PollTarget::Group(group.clone()),
            (None, Some(user)) => PollTarget::User(user.clone()),
            (None, None) => return Err(MissingPollConfig::Target),
        };

        Ok(PollCredentials {
            access_token,
            target,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerTiming {
    pub interval: Duration,
    pub auth_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for PollerTiming {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            auth_backoff: DEFAULT_AUTH_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader {
            lookup,
            warnings: Vec::new(),
        };

        let url = env.string("SUPABASE_URL");
        let service_key = env.string("SUPABASE_SERVICE_KEY");
        let postgrest = match (url, service_key) {
            (Some(url), Some(service_key)) => Some(PostgrestSettings { url, service_key }),
            (Some(_), None) => {
                env.warn("SUPABASE_URL is set but SUPABASE_SERVICE_KEY is not; using SQLite");
                None
            }
            _ => None,
        };

        let api = ApiSettings {
            bind_address: env
                .string("API_BIND_ADDRESS")
                .unwrap_or_else(|| ApiSettings::default().bind_address),
            port: env.parsed("API_PORT", ApiSettings::default().port),
            frontend_url: env.string("FRONTEND_URL"),
        };

        let facebook = FacebookSettings {
            poll_user_token: env.string("FACEBOOK_POLL_USER_TOKEN"),
            poll_user_id: env.string("FACEBOOK_POLL_USER_ID"),
            default_group_id: env.string("FACEBOOK_DEFAULT_GROUP_ID"),
            default_class_id: env.string("FACEBOOK_DEFAULT_CLASS_ID"),
            webhook_verify_token: env.string("FACEBOOK_WEBHOOK_VERIFY_TOKEN"),
            app_secret: env.string("FACEBOOK_APP_SECRET"),
            graph_base_url: env
                .string("FACEBOOK_GRAPH_BASE_URL")
                .unwrap_or_else(|| graph_api::DEFAULT_BASE_URL.to_string()),
            graph_api_version: env
                .string("FACEBOOK_GRAPH_API_VERSION")
                .unwrap_or_else(|| graph_api::DEFAULT_API_VERSION.to_string()),
        };

        let poller = PollerTiming {
            interval: env.secs("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL),
            auth_backoff: env.secs("POLL_AUTH_BACKOFF_SECS", DEFAULT_AUTH_BACKOFF),
            request_timeout: env.secs("POLL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT),
        };

        let shutdown_timeout = env.secs("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT);

        let logging = LoggingSettings {
            filter: env
                .string("RUST_LOG")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_dir: env.string("LOG_DIR").map(PathBuf::from),
        };

        let database_url = env
            .string("DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Self {
            database_url,
            postgrest,
            api,
            facebook,
            poller,
            shutdown_timeout,
            logging,
            warnings: env.warnings,
        }
    }
}

struct EnvReader<F> {
    lookup: F,
    warnings: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&mut self, key: &str, default: T) -> T {
        let Some(raw) = self.string(key) else {
            return default;
        };
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                self.warn(format!("{key}={raw:?} is not valid, using the default"));
                default
            }
        }
    }

    fn secs(&mut self, key: &str, default: Duration) -> Duration {
        let secs = self.parsed(key, default.as_secs());
        if secs == 0 {
            self.warn(format!("{key} must be positive, using the default"));
            return default;
        }
        Duration::from_secs(secs)
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.postgrest.is_none());
        assert_eq!(config.api, ApiSettings::default());
        assert_eq!(config.poller, PollerTiming::default());
        assert_eq!(config.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(config.facebook.graph_base_url, graph_api::DEFAULT_BASE_URL);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_missing_token_disables_polling() {
        let config = config(&[("FACEBOOK_POLL_USER_ID", "42")]);
        assert_eq!(
            config.facebook.poll_credentials(),
            Err(MissingPollConfig::AccessToken)
        );
    }

    #[test]
    fn test_missing_target_disables_polling() {
        let config = config(&[("FACEBOOK_POLL_USER_TOKEN", "tok")]);
        assert_eq!(
            config.facebook.poll_credentials(),
            Err(MissingPollConfig::Target)
        );
    }

    #[test]
    fn test_group_target_wins_over_user() {
        let config = config(&[
            ("FACEBOOK_POLL_USER_TOKEN", "tok"),
            ("FACEBOOK_POLL_USER_ID", "42"),
            ("FACEBOOK_DEFAULT_GROUP_ID", "g-7"),
        ]);
        let creds = config.facebook.poll_credentials().unwrap();
        assert_eq!(creds.access_token, "tok");
        assert_eq!(creds.target, PollTarget::Group("g-7".to_string()));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config(&[
            ("FACEBOOK_POLL_USER_TOKEN", "   "),
            ("FACEBOOK_DEFAULT_CLASS_ID", ""),
        ]);
        assert!(config.facebook.poll_user_token.is_none());
        assert!(config.facebook.default_class_id.is_none());
    }

    #[test]
    fn test_invalid_numbers_fall_back_with_warning() {
        let config = config(&[
            ("POLL_INTERVAL_SECS", "soon"),
            ("POLL_AUTH_BACKOFF_SECS", "0"),
            ("API_PORT", "99999"),
        ]);
        assert_eq!(config.poller.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.poller.auth_backoff, DEFAULT_AUTH_BACKOFF);
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.warnings.len(), 3);
    }

    #[test]
    fn test_postgrest_needs_both_values() {
        let config = config(&[("SUPABASE_URL", "https://db.example.com")]);
        assert!(config.postgrest.is_none());
        assert_eq!(config.warnings.len(), 1);

        let config = config_with_key();
        let postgrest = config.postgrest.unwrap();
        assert_eq!(postgrest.url, "https://db.example.com");
        assert_eq!(postgrest.service_key, "sb_secret_x");
    }

    fn config_with_key() -> AppConfig {
        config(&[
            ("SUPABASE_URL", "https://db.example.com"),
            ("SUPABASE_SERVICE_KEY", "sb_secret_x"),
        ])
    }

    #[test]
    fn test_custom_intervals() {
        let config = config(&[
            ("POLL_INTERVAL_SECS", "30"),
            ("POLL_AUTH_BACKOFF_SECS", "120"),
            ("SHUTDOWN_TIMEOUT_SECS", "3"),
        ]);
        assert_eq!(config.poller.interval, Duration::from_secs(30));
        assert_eq!(config.poller.auth_backoff, Duration::from_secs(120));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }
}
