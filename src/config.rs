//! Run configuration loaded from the tap's JSON config file.
//!
//! ```json
//! {
//!   "platform": "grader",
//!   "mongoHost": "db.internal", "mongoPort": 27017,
//!   "mongoUser": "reader", "mongoPassword": "secret",
//!   "mongoAuthSource": "admin",
//!   "partitions": 10, "maxWorkers": 10,
//!   "retryAttempts": 1, "retryBackoffMs": 500, "progressInterval": 1000
//! }
//! ```
//!
//! Connection parameters are only needed when reading from MongoDB.

use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::{Context, Result, anyhow, ensure};
use serde::Deserialize;

use crate::stream::DEFAULT_DATABASE;

pub const DEFAULT_PARTITIONS: usize = 10;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;
pub const DEFAULT_MONGO_PORT: u16 = 27017;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub platform: String,
    pub mongo_host: Option<String>,
    pub mongo_user: Option<String>,
    pub mongo_password: Option<String>,
    mongo_port: Option<PortValue>,
    pub mongo_auth_source: Option<String>,
    pub database: Option<String>,
    pub partitions: Option<usize>,
    pub max_workers: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub progress_interval: Option<u64>,
}

impl Config {
    /// A configuration with only the platform set; everything else defaults.
    pub fn with_platform(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            mongo_host: None,
            mongo_user: None,
            mongo_password: None,
            mongo_port: None,
            mongo_auth_source: None,
            database: None,
            partitions: None,
            max_workers: None,
            retry_attempts: None,
            retry_backoff_ms: None,
            progress_interval: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config JSON {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.partitions != Some(0), "partitions must be at least 1");
        ensure!(self.max_workers != Some(0), "maxWorkers must be at least 1");
        self.mongo_port()?;
        Ok(())
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn partitions(&self) -> usize {
        self.partitions.unwrap_or(DEFAULT_PARTITIONS)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| self.partitions())
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS))
    }

    pub fn progress_interval(&self) -> u64 {
        self.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL)
    }

    pub fn mongo_port(&self) -> Result<u16> {
        match &self.mongo_port {
            None => Ok(DEFAULT_MONGO_PORT),
            Some(PortValue::Number(port)) => Ok(*port),
            Some(PortValue::Text(text)) => text
                .trim()
                .parse()
                .with_context(|| format!("Invalid mongoPort '{text}'")),
        }
    }

    pub fn connection_string(&self) -> Result<String> {
        let host = required(&self.mongo_host, "mongoHost")?;
        let user = required(&self.mongo_user, "mongoUser")?;
        let password = required(&self.mongo_password, "mongoPassword")?;
        let auth_source = required(&self.mongo_auth_source, "mongoAuthSource")?;
        let port = self.mongo_port()?;
        Ok(format!(
            "mongodb://{}:{}@{host}:{port}/?authSource={auth_source}",
            urlencoding::encode(user),
            urlencoding::encode(password)
        ))
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Config option '{name}' is required to connect to MongoDB"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn builds_connection_string_with_escaped_credentials() {
        let config = parse(
            r#"{"platform": "grader", "mongoHost": "db", "mongoPort": "27018",
                "mongoUser": "reader", "mongoPassword": "p@ss:word",
                "mongoAuthSource": "admin"}"#,
        );
        assert_eq!(
            config.connection_string().unwrap(),
            "mongodb://reader:p%40ss%3Aword@db:27018/?authSource=admin"
        );
    }

    #[test]
    fn reserved_characters_in_credentials_are_escaped() {
        let config = parse(
            r#"{"platform": "grader", "mongoHost": "db", "mongoUser": "ops team",
                "mongoPassword": "a/b?c#d", "mongoAuthSource": "admin"}"#,
        );
        assert_eq!(
            config.connection_string().unwrap(),
            "mongodb://ops%20team:a%2Fb%3Fc%23d@db:27017/?authSource=admin"
        );
    }

    #[test]
    fn defaults_apply_when_options_are_absent() {
        let config = parse(r#"{"platform": "grader"}"#);
        assert_eq!(config.partitions(), DEFAULT_PARTITIONS);
        assert_eq!(config.max_workers(), DEFAULT_PARTITIONS);
        assert_eq!(config.database(), "proposal_tool");
        assert_eq!(config.mongo_port().unwrap(), 27017);
        assert!(config.connection_string().is_err());
    }

    #[test]
    fn zero_partitions_are_rejected() {
        let config = parse(r#"{"platform": "grader", "partitions": 0}"#);
        assert!(config.validate().is_err());
        let bad_port = parse(r#"{"platform": "grader", "mongoPort": "http"}"#);
        assert!(bad_port.validate().is_err());
    }

    #[test]
    fn platform_is_required() {
        assert!(serde_json::from_str::<Config>(r#"{"mongoHost": "db"}"#).is_err());
    }
}
