//! Configuration management from environment variables
//!
//! Handles:
//! - Proxmox API credentials and TLS verification
//! - SSH principal, key file and readiness timing
//! - Telegram notification settings (optional)
//! - Inventory location and domain used to build host FQDNs
//!
//! A `.env` file is honoured by the binary (via `dotenvy`) before this runs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::clients::proxmox::ProxmoxConfig;
use crate::clients::ssh::SshConfig;
use crate::error::ConfigError;
use crate::pipeline::PipelineSettings;

/// TCP connect timeout for a single SSH attempt
const SSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Settings {
    pub inventory_file: PathBuf,
    pub domain: String,
    pub proxmox: ProxmoxConfig,
    pub ssh: SshConfig,
    pub pipeline: PipelineSettings,
    pub notification: Option<TelegramSettings>,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub timeout: Duration,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let notifications_enabled = env.flag("ENABLE_NOTIFICATION", true);
        let mut required = vec![
            "DOMAIN",
            "PROXMOX_HOST",
            "PROXMOX_USER",
            "PROXMOX_PASSWORD",
            "SSH_USER",
            "SSH_KEY_FILE",
        ];
        if notifications_enabled {
            required.extend_from_slice(&["TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID"]);
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|key| env.get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let request_timeout = Duration::from_secs(env.parse("POST_REQ_TIMEOUT", 30u64)?);
        let retry_interval = env.parse("SSH_RETRY_INTERVAL", 10u64)?;
        if retry_interval == 0 {
            return Err(ConfigError::Invalid {
                var: "SSH_RETRY_INTERVAL".to_string(),
                value: "0".to_string(),
            });
        }

        let pipeline = PipelineSettings {
            ssh_timeout: Duration::from_secs(env.parse("SSH_TIMEOUT", 300u64)?),
            retry_interval: Duration::from_secs(retry_interval),
            show_patch_output: env.flag("ENABLE_PATCH_OUTPUT", false),
            ..PipelineSettings::default()
        };

        let notification = if notifications_enabled {
            Some(TelegramSettings {
                bot_token: env.required("TELEGRAM_BOT_TOKEN")?,
                chat_id: env.required("TELEGRAM_CHAT_ID")?,
                timeout: request_timeout,
            })
        } else {
            None
        };

        Ok(Settings {
            inventory_file: PathBuf::from(
                env.get("INVENTORY_FILE")
                    .unwrap_or_else(|| "inventory.yml".to_string()),
            ),
            domain: env.required("DOMAIN")?,
            proxmox: ProxmoxConfig {
                host: env.required("PROXMOX_HOST")?,
                user: env.required("PROXMOX_USER")?,
                password: env.required("PROXMOX_PASSWORD")?,
                verify_ssl: env.flag("PROXMOX_VERIFY_SSL", false),
                node: env.get("PROXMOX_NODE"),
                request_timeout,
            },
            ssh: SshConfig {
                user: env.required("SSH_USER")?,
                key_file: PathBuf::from(env.required("SSH_KEY_FILE")?),
                port: env.parse("SSH_PORT", 22u16)?,
                connect_timeout: SSH_CONNECT_TIMEOUT,
            },
            pipeline,
            notification,
        })
    }
}

/// Accepts y, yes, t, true, on, 1 (case-insensitive)
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "y" | "yes" | "t" | "true" | "on" | "1"
    )
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<'a, F: Fn(&str) -> Option<String>> Env<'a, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing(vec![key.to_string()]))
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).map(|v| parse_bool(&v)).unwrap_or(default)
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: key.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DOMAIN", "example.com"),
            ("PROXMOX_HOST", "pve.example.com"),
            ("PROXMOX_USER", "root@pam"),
            ("PROXMOX_PASSWORD", "secret"),
            ("SSH_USER", "patch"),
            ("SSH_KEY_FILE", "/home/patch/.ssh/id_ed25519"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "42"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Settings, ConfigError> {
        Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let settings = load(&base_env()).unwrap();
        assert_eq!(settings.inventory_file, PathBuf::from("inventory.yml"));
        assert_eq!(settings.pipeline.ssh_timeout, Duration::from_secs(300));
        assert_eq!(settings.pipeline.retry_interval, Duration::from_secs(10));
        assert!(!settings.pipeline.show_patch_output);
        assert!(!settings.proxmox.verify_ssl);
        assert_eq!(settings.proxmox.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.ssh.port, 22);
        assert!(settings.notification.is_some());
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let mut env = base_env();
        env.remove("DOMAIN");
        env.remove("SSH_USER");
        match load(&env) {
            Err(ConfigError::Missing(vars)) => {
                assert_eq!(vars, vec!["DOMAIN".to_string(), "SSH_USER".to_string()]);
            }
            other => panic!("expected missing error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_telegram_optional_when_notifications_disabled() {
        let mut env = base_env();
        env.remove("TELEGRAM_BOT_TOKEN");
        env.remove("TELEGRAM_CHAT_ID");
        env.insert("ENABLE_NOTIFICATION", "off");
        let settings = load(&env).unwrap();
        assert!(settings.notification.is_none());
    }

    #[test]
    fn test_invalid_integer() {
        let mut env = base_env();
        env.insert("SSH_TIMEOUT", "five minutes");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { var, .. }) if var == "SSH_TIMEOUT"
        ));
    }

    #[test]
    fn test_zero_retry_interval_rejected() {
        let mut env = base_env();
        env.insert("SSH_RETRY_INTERVAL", "0");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_parse_bool() {
        for value in ["y", "Yes", "T", "true", "ON", "1"] {
            assert!(parse_bool(value), "{} should be true", value);
        }
        for value in ["n", "no", "false", "0", "", "maybe"] {
            assert!(!parse_bool(value), "{} should be false", value);
        }
    }
}
