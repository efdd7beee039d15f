//! Environment-driven configuration.
//!
//! | Variable                | Default                           |
//! |-------------------------|-----------------------------------|
//! | `AUDIT_DB_URL`          | `sqlite://audit.sqlite3`          |
//! | `AUDIT_PUBLIC_BASE_URL` | `http://localhost:3000`           |
//! | `REPORT_API_KEY`        | unset (report generation off)     |
//! | `REPORT_BASE_URL`       | `https://openrouter.ai/api/v1`    |
//! | `REPORT_MODEL`          | `deepseek/deepseek-r1-0528:free`  |
//! | `SMTP_HOST`             | unset (notifications off)         |
//! | `SMTP_PORT`             | `587`                             |
//! | `SMTP_FROM`             | `noreply@auditflow.local`         |
//! | `SMTP_USER`             | unset                             |
//! | `SMTP_PASSWORD`         | unset                             |

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://audit.sqlite3";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REPORT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_REPORT_MODEL: &str = "deepseek/deepseek-r1-0528:free";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "noreply@auditflow.local";

/// Settings for the chat-completions endpoint used by narrative reports.
#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ReportConfig {
    /// `None` when no API key is configured.
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = non_blank(lookup("REPORT_API_KEY"))?;
        Some(Self {
            base_url: non_blank(lookup("REPORT_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_REPORT_BASE_URL.into()),
            api_key,
            model: non_blank(lookup("REPORT_MODEL")).unwrap_or_else(|| DEFAULT_REPORT_MODEL.into()),
        })
    }
}

/// SMTP settings for assignment emails.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// `Ok(None)` when `SMTP_HOST` is unset; `ConfigError::InvalidPort` if
    /// `SMTP_PORT` is not a port number.
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = non_blank(lookup("SMTP_HOST")) else {
            return Ok(None);
        };
        let smtp_port = match non_blank(lookup("SMTP_PORT")) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort {
                var: "SMTP_PORT",
                raw,
            })?,
            None => DEFAULT_SMTP_PORT,
        };
        Ok(Some(Self {
            smtp_host,
            smtp_port,
            from_address: non_blank(lookup("SMTP_FROM"))
                .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.into()),
            smtp_user: non_blank(lookup("SMTP_USER")),
            smtp_password: lookup("SMTP_PASSWORD"),
        }))
    }
}

/// Everything the binary needs to assemble services.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Origin used to build auditor access links.
    pub public_base_url: Url,
    pub report: Option<ReportConfig>,
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed URLs or ports.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed URLs or ports.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url =
            non_blank(lookup("AUDIT_DB_URL")).unwrap_or_else(|| DEFAULT_DB_URL.into());
        let raw_base = non_blank(lookup("AUDIT_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into());
        let public_base_url = parse_base_url("AUDIT_PUBLIC_BASE_URL", &raw_base)?;

        Ok(Self {
            database_url,
            public_base_url,
            report: ReportConfig::from_lookup(lookup),
            email: EmailConfig::from_lookup(lookup)?,
        })
    }

    #[must_use]
    pub fn with_database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }
}

/// Parse a URL that paths can be appended to.
///
/// # Errors
///
/// Returns `ConfigError` if `raw` is not an absolute URL with a path.
pub fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::NotABaseUrl {
            var,
            raw: raw.to_owned(),
        });
    }
    Ok(url)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_disable_optional_collaborators() {
        let config = AppConfig::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DB_URL);
        assert_eq!(config.public_base_url.as_str(), "http://localhost:3000/");
        assert!(config.report.is_none());
        assert!(config.email.is_none());
    }

    #[test]
    fn reads_report_and_smtp_settings() {
        let config = AppConfig::from_lookup(&lookup_from(&[
            ("AUDIT_DB_URL", "sqlite::memory:"),
            ("REPORT_API_KEY", "sk-test"),
            ("REPORT_MODEL", "test/model"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USER", "mailer"),
        ]))
        .unwrap();

        let report = config.report.expect("report config");
        assert_eq!(report.base_url, DEFAULT_REPORT_BASE_URL);
        assert_eq!(report.model, "test/model");

        let email = config.email.expect("email config");
        assert_eq!(email.smtp_port, 2525);
        assert_eq!(email.from_address, DEFAULT_FROM_ADDRESS);
        assert_eq!(email.smtp_user.as_deref(), Some("mailer"));
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn blank_api_key_disables_reports() {
        let config = AppConfig::from_lookup(&lookup_from(&[("REPORT_API_KEY", "  ")])).unwrap();
        assert!(config.report.is_none());
    }

    #[test]
    fn rejects_bad_url_and_port() {
        let err = AppConfig::from_lookup(&lookup_from(&[("AUDIT_PUBLIC_BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = AppConfig::from_lookup(&lookup_from(&[("AUDIT_PUBLIC_BASE_URL", "mailto:a@b.c")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotABaseUrl { .. }));

        let err = AppConfig::from_lookup(&lookup_from(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "seventy"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }
}
