//! Service configuration.
//!
//! # Purpose
//! All knobs land in one `ApiConfig`, loadable from a JSON file
//! (`HERMES_CONFIG=<path>`) or an inline JSON string
//! (`HERMES_CONFIG_JSON=<json>`). Every field has a default so partial
//! documents are valid. Boolean fields also accept the legacy
//! string-encoded form ("true"/"false").
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_ip: String,
    pub port: u16,
    pub zookeeper_hosts: Vec<String>,
    pub kafka_znode: String,
    pub store_host: String,
    pub store_db: String,
    pub certificate: String,
    pub certificate_key: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub per_resource_auth: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub push_enabled: bool,
    pub push_worker_token: String,
    pub push_server_host: String,
    pub push_server_port: u16,
    pub metrics_bind: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: String::new(),
            port: 8080,
            zookeeper_hosts: vec!["localhost".to_string()],
            kafka_znode: String::new(),
            store_host: "localhost".to_string(),
            store_db: "hermes".to_string(),
            certificate: "/etc/pki/tls/certs/localhost.crt".to_string(),
            certificate_key: "/etc/pki/tls/private/localhost.key".to_string(),
            per_resource_auth: true,
            push_enabled: true,
            push_worker_token: String::new(),
            push_server_host: "localhost".to_string(),
            push_server_port: 5555,
            metrics_bind: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

impl ApiConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).with_context(|| "parse configuration json")
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read configuration file: {path}"))?;
        Self::from_json_str(&contents)
    }

    /// Resolution order: HERMES_CONFIG (file), HERMES_CONFIG_JSON (inline),
    /// built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("HERMES_CONFIG") {
            return Self::from_json_file(&path);
        }
        if let Ok(raw) = std::env::var("HERMES_CONFIG_JSON") {
            return Self::from_json_str(&raw);
        }
        Ok(Self::default())
    }

    /// Address the API listens on; an empty `bind_ip` binds everywhere.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip = if self.bind_ip.is_empty() {
            "0.0.0.0"
        } else {
            self.bind_ip.as_str()
        };
        format!("{ip}:{}", self.port)
            .parse()
            .with_context(|| "parse bind address")
    }

    pub fn push_server_endpoint(&self) -> String {
        format!("{}:{}", self.push_server_host, self.push_server_port)
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Flag(value) => Ok(value),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn clear_hermes_env() {
        for key in ["HERMES_CONFIG", "HERMES_CONFIG_JSON"] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[serial]
    #[test]
    fn load_uses_defaults_without_env() {
        clear_hermes_env();
        let config = ApiConfig::load().expect("load");
        assert_eq!(config.port, 8080);
        assert!(config.per_resource_auth);
        assert!(config.push_enabled);
        assert_eq!(config.push_server_endpoint(), "localhost:5555");
        assert_eq!(config.bind_addr().expect("addr").to_string(), "0.0.0.0:8080");
    }

    #[serial]
    #[test]
    fn inline_json_overrides() {
        clear_hermes_env();
        unsafe {
            env::set_var(
                "HERMES_CONFIG_JSON",
                r#"{
                    "bind_ip": "127.0.0.1",
                    "port": 9000,
                    "per_resource_auth": "false",
                    "push_enabled": false,
                    "push_worker_token": "push_token"
                }"#,
            );
        }
        let config = ApiConfig::load().expect("load");
        assert_eq!(config.bind_addr().expect("addr").to_string(), "127.0.0.1:9000");
        assert!(!config.per_resource_auth);
        assert!(!config.push_enabled);
        assert_eq!(config.push_worker_token, "push_token");
        clear_hermes_env();
    }

    #[serial]
    #[test]
    fn file_config_loads_and_missing_file_fails() {
        clear_hermes_env();
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"store_db": "hermes_test", "zookeeper_hosts": ["zk1", "zk2"]}"#,
        )
        .expect("write");
        unsafe {
            env::set_var("HERMES_CONFIG", path.to_str().expect("path"));
        }
        let config = ApiConfig::load().expect("load");
        assert_eq!(config.store_db, "hermes_test");
        assert_eq!(config.zookeeper_hosts, vec!["zk1", "zk2"]);

        unsafe {
            env::set_var("HERMES_CONFIG", dir.path().join("missing.json").to_str().expect("path"));
        }
        assert!(ApiConfig::load().is_err());
        clear_hermes_env();
    }

    #[serial]
    #[test]
    fn malformed_documents_are_rejected() {
        clear_hermes_env();
        assert!(ApiConfig::from_json_str("not json").is_err());
        assert!(ApiConfig::from_json_str(r#"{"push_enabled": "maybe"}"#).is_err());
        assert!(ApiConfig::from_json_str(r#"{"port": "not-a-number"}"#).is_err());
    }
}
