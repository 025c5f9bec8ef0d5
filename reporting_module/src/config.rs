use std::env;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::mail::{AddressError, Mailbox, BOT_NAME};
use crate::BoxError;

pub const DEFAULT_INBOUND_BODY_MAX_BYTES: usize = 25 * 1024 * 1024;
pub const EMAIL_DESTINATION: &str = "email";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read reporting config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse reporting config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to unmarshal email config: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("reporting {0:?} of type email has no config")]
    MissingEmailConfig(String),
    #[error(transparent)]
    BadAddress(#[from] AddressError),
    #[error("both moderation and mail_maintainers set")]
    ModerationWithMaintainers,
}

/// Per-destination settings of an email reporting route. Reports carry it as
/// a JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(default, alias = "Moderation")]
    pub moderation: bool,
    #[serde(default, alias = "MailMaintainers")]
    pub mail_maintainers: bool,
}

impl EmailConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Mailbox::parse(&self.email)?;
        if self.moderation && self.mail_maintainers {
            return Err(ConfigError::ModerationWithMaintainers);
        }
        Ok(())
    }

    pub fn from_json(blob: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(blob)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Email(EmailConfig),
    /// A reporting route this service does not deliver to.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reporting {
    pub name: String,
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub reporting: Vec<Reporting>,
}

/// Reporting routes of every namespace. Every email destination has been
/// validated by the time a value of this type exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportingConfig {
    pub namespaces: Vec<Namespace>,
}

#[derive(Debug, Deserialize)]
struct ReportingConfigFile {
    #[serde(default)]
    namespaces: Vec<NamespaceFile>,
}

#[derive(Debug, Deserialize)]
struct NamespaceFile {
    name: String,
    #[serde(default)]
    reporting: Vec<ReportingFile>,
}

#[derive(Debug, Deserialize)]
struct ReportingFile {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    config: Option<toml::Table>,
}

impl ReportingConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ReportingConfigFile = toml::from_str(content)?;
        let mut namespaces = Vec::with_capacity(file.namespaces.len());
        for namespace in file.namespaces {
            let mut reporting = Vec::with_capacity(namespace.reporting.len());
            for route in namespace.reporting {
                let destination = if route.kind == EMAIL_DESTINATION {
                    let table = route
                        .config
                        .ok_or_else(|| ConfigError::MissingEmailConfig(route.name.clone()))?;
                    let config: EmailConfig = toml::Value::Table(table).try_into()?;
                    config.validate()?;
                    Destination::Email(config)
                } else {
                    Destination::Other(route.kind)
                };
                reporting.push(Reporting {
                    name: route.name,
                    destination,
                });
            }
            namespaces.push(Namespace {
                name: namespace.name,
                reporting,
            });
        }
        Ok(Self { namespaces })
    }

    pub fn email_configs(&self) -> impl Iterator<Item = &EmailConfig> {
        self.namespaces
            .iter()
            .flat_map(|namespace| namespace.reporting.iter())
            .filter_map(|reporting| match &reporting.destination {
                Destination::Email(config) => Some(config),
                Destination::Other(_) => None,
            })
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub reporting_config_path: PathBuf,
    /// Bare address replies are routed to; bug ids are embedded into it.
    pub bot_email: String,
    pub testing_enabled: bool,
    pub dashboard_url: String,
    pub dashboard_api_key: Option<String>,
    pub inbound_body_max_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();

        let host = env::var("EMAIL_REPORTING_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("EMAIL_REPORTING_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(9200);
        let reporting_config_path = resolve_path(
            env_var_non_empty("REPORTING_CONFIG_PATH")
                .unwrap_or_else(|| "reporting.toml".to_string()),
        )?;
        let bot_email =
            env_var_non_empty("BOT_EMAIL_ADDRESS").ok_or("BOT_EMAIL_ADDRESS is not set")?;
        let bot_email = Mailbox::parse(&bot_email)?.address;
        let testing_enabled = env_flag("EMAIL_TESTING_ENABLED", false);
        let dashboard_url =
            env_var_non_empty("DASHBOARD_API_URL").ok_or("DASHBOARD_API_URL is not set")?;
        let dashboard_api_key = env_var_non_empty("DASHBOARD_API_KEY");
        let inbound_body_max_bytes = env::var("INBOUND_MAX_BYTES")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_INBOUND_BODY_MAX_BYTES);

        Ok(Self {
            host,
            port,
            reporting_config_path,
            bot_email,
            testing_enabled,
            dashboard_url,
            dashboard_api_key,
            inbound_body_max_bytes,
        })
    }

    /// `"bugbot" <bot email>`, the untagged form of every sender address.
    pub fn own_address(&self) -> String {
        Mailbox {
            name: Some(BOT_NAME.to_string()),
            address: self.bot_email.clone(),
        }
        .to_string()
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Err(_) => default,
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}
