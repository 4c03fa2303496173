use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_FILE: &str = "hero_roles";
const ENV_PREFIX: &str = "HERO_ROLES";

/// Resolved runtime settings. Loaded once at startup; everything below
/// `main` receives plain values from here.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub resource_path: String,
    pub retry_limit: u32,
    pub base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub default_output_directory: PathBuf,
    #[serde(default)]
    pub failure_notification_recipients: String,
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Settings {
    /// Defaults, then `hero_roles.toml` (or `file`, which must exist), then
    /// `HERO_ROLES_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("retry_limit", 5)?
            .set_default("base_delay_ms", 1000)?
            .set_default("request_timeout_secs", 30)?;

        let builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid or missing configuration keys")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.base_url.trim().is_empty(), "base_url must not be empty");
        ensure!(self.retry_limit > 0, "retry_limit must be at least 1");
        ensure!(
            !self.default_output_directory.as_os_str().is_empty(),
            "default_output_directory must not be empty"
        );
        Ok(())
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.resource_path)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn recipients(&self) -> Vec<String> {
        split_recipients(&self.failure_notification_recipients)
    }
}

/// Split a `;` or `,` delimited address list, dropping blanks.
pub fn split_recipients(list: &str) -> Vec<String> {
    list.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    use super::*;

    // Tests that load settings read the process environment.
    static ENV: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_toml(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn recipients_accept_both_delimiters() {
        assert_eq!(
            split_recipients("a@x.org; b@x.org,c@x.org ;;"),
            ["a@x.org", "b@x.org", "c@x.org"]
        );
        assert!(split_recipients("").is_empty());
    }

    #[test]
    fn file_values_and_defaults() {
        let _env = env_lock();
        let file = write_toml(
            r#"
            base_url = "https://wiki.example.net"
            resource_path = "/dota2/Hero_Roles"
            default_output_directory = "/tmp/roles"
            failure_notification_recipients = "ops@example.net"
            "#,
        );
        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.url(), "https://wiki.example.net/dota2/Hero_Roles");
        assert_eq!(s.retry_limit, 5);
        assert_eq!(s.base_delay(), Duration::from_millis(1000));
        assert_eq!(s.recipients(), ["ops@example.net"]);
        assert!(s.smtp.is_none());
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let _env = env_lock();
        let file = write_toml(r#"resource_path = "/x""#);
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn zero_retry_limit_is_rejected() {
        let _env = env_lock();
        let file = write_toml(
            r#"
            base_url = "https://wiki.example.net"
            resource_path = "/x"
            default_output_directory = "/tmp"
            retry_limit = 0
            "#,
        );
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("retry_limit"));
    }

    #[test]
    fn environment_overrides_file() {
        let _env = env_lock();
        let file = write_toml(
            r#"
            base_url = "https://wiki.example.net"
            resource_path = "/x"
            default_output_directory = "/tmp"
            retry_limit = 2

            [smtp]
            host = "mail.example.net"
            from = "scraper@example.net"
            "#,
        );

        std::env::set_var("HERO_ROLES_RETRY_LIMIT", "7");
        std::env::set_var("HERO_ROLES_SMTP__PORT", "2525");
        let loaded = Settings::load(Some(file.path()));
        std::env::remove_var("HERO_ROLES_RETRY_LIMIT");
        std::env::remove_var("HERO_ROLES_SMTP__PORT");

        let s = loaded.unwrap();
        assert_eq!(s.retry_limit, 7);
        let smtp = s.smtp.unwrap();
        assert_eq!(smtp.host, "mail.example.net");
        assert_eq!(smtp.port, 2525);
    }
}
