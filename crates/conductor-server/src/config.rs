use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use conductor_gateway::GatewayConfig;

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8700
}

fn default_headless() -> bool {
    true
}

fn default_retention_days() -> u64 {
    14
}

/// Engine configuration: JSON file first, environment variables on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Vector-memory collaborator base URL; absent means the null store.
    #[serde(default)]
    pub memory_url: Option<String>,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Serve automation from the headless mock instead of a live browser.
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,
    #[serde(default = "default_retention_days")]
    pub log_retention_days: u64,
    /// Evict terminal sessions older than this many minutes. Absent keeps
    /// them for the life of the process.
    #[serde(default)]
    pub session_retention_minutes: Option<u64>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            memory_url: None,
            hostname: default_hostname(),
            port: default_port(),
            headless: default_headless(),
            logs_dir: None,
            log_retention_days: default_retention_days(),
            session_retention_minutes: None,
        }
    }
}

impl ConductorConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CONDUCTOR_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        if let Ok(model) = std::env::var("CONDUCTOR_CONTROL_MODEL") {
            self.gateway.control_model = model;
        }
        if let Ok(model) = std::env::var("CONDUCTOR_CODE_MODEL") {
            self.gateway.code_model = model;
        }
        if let Ok(secs) = std::env::var("CONDUCTOR_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.gateway.timeout_secs = secs;
            }
        }
        if let Ok(url) = std::env::var("CONDUCTOR_MEMORY_URL") {
            self.memory_url = Some(url);
        }
        if let Ok(headless) = std::env::var("CONDUCTOR_HEADLESS") {
            self.headless = headless != "0" && !headless.eq_ignore_ascii_case("false");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_and_headless() {
        let config = ConductorConfig::default();
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.port, 8700);
        assert!(config.headless);
        assert!(config.memory_url.is_none());
        assert!(config.session_retention_minutes.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conductor.json");
        std::fs::write(
            &path,
            r#"{"port": 9000, "gateway": {"base_url": "http://models:11434",
                "control_model": "a", "code_model": "b", "timeout_secs": 30}}"#,
        )
        .expect("write");
        let config = ConductorConfig::load(Some(&path)).expect("load");
        assert_eq!(config.port, 9000);
        assert_eq!(config.gateway.base_url, "http://models:11434");
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.log_retention_days, 14);
    }
}
