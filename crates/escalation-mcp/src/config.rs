use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be one of {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0} is required for the selected store")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Stdio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Json,
    Memory,
    Mongo,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub store: StoreKind,
    pub store_path: PathBuf,
    pub mongo_url: Option<String>,
    pub db_name: String,
    pub phone_country_code: String,
    /// Recommended variables that were unset and fell back to a default.
    pub defaulted: Vec<&'static str>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut defaulted = Vec::new();

        let transport = match read("ESCALATION_TRANSPORT").as_deref() {
            None | Some("http") => Transport::Http,
            Some("stdio") => Transport::Stdio,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "ESCALATION_TRANSPORT",
                    expected: "http|stdio",
                    value: other.to_string(),
                })
            }
        };

        let store = match read("ESCALATION_STORE").as_deref() {
            None | Some("json") => StoreKind::Json,
            Some("memory") => StoreKind::Memory,
            Some("mongodb" | "mongo") => StoreKind::Mongo,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "ESCALATION_STORE",
                    expected: "json|memory|mongodb",
                    value: other.to_string(),
                })
            }
        };

        let port = match read("PORT") {
            None => 8001,
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value: raw.clone(),
            })?,
        };

        let backend_url = read("BACKEND_URL").unwrap_or_else(|| {
            defaulted.push("BACKEND_URL");
            "http://localhost:5000".to_string()
        });

        let mongo_url = read("MONGO_URL");
        if store == StoreKind::Mongo && mongo_url.is_none() {
            return Err(ConfigError::Missing("MONGO_URL"));
        }

        Ok(Self {
            transport,
            host: read("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            backend_url,
            store,
            store_path: read("ESCALATION_STORE_PATH")
                .map_or_else(
                    || PathBuf::from("./data/incident-store.json"),
                    PathBuf::from,
                ),
            mongo_url,
            db_name: read("DB_NAME").unwrap_or_else(|| "incident_management".to_string()),
            phone_country_code: read("ESCALATION_PHONE_COUNTRY_CODE")
                .unwrap_or_else(|| "91".to_string()),
            defaulted,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.store, StoreKind::Json);
        assert_eq!(config.bind_addr(), "0.0.0.0:8001");
        assert_eq!(config.backend_url, "http://localhost:5000");
        assert_eq!(config.db_name, "incident_management");
        assert_eq!(config.phone_country_code, "91");
        assert_eq!(config.defaulted, vec!["BACKEND_URL"]);
    }

    #[test]
    fn values_are_trimmed_and_blank_means_unset() {
        let config = config_from(&[
            ("ESCALATION_TRANSPORT", " stdio "),
            ("PORT", "9100"),
            ("HOST", "   "),
            ("BACKEND_URL", "http://tickets:5000"),
        ])
        .expect("config");
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.bind_addr(), "0.0.0.0:9100");
        assert!(config.defaulted.is_empty());
    }

    #[test]
    fn mongodb_store_requires_a_url() {
        assert_eq!(
            config_from(&[("ESCALATION_STORE", "mongodb")]).err(),
            Some(ConfigError::Missing("MONGO_URL"))
        );
        let config = config_from(&[
            ("ESCALATION_STORE", "mongodb"),
            ("MONGO_URL", "mongodb://localhost:27017"),
        ])
        .expect("config");
        assert_eq!(config.store, StoreKind::Mongo);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        assert!(matches!(
            config_from(&[("ESCALATION_TRANSPORT", "grpc")]),
            Err(ConfigError::Invalid { name: "ESCALATION_TRANSPORT", .. })
        ));
    }
}
