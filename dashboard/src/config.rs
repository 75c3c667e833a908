use shared_types::{EnvironmentReport, PermissionsReport};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::capability::MEDIA_CAPTURE_APIS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env(value: &str) -> anyhow::Result<Self> {
        match value {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(anyhow::anyhow!(
                "Invalid DASHBOARD_LOG_FORMAT '{other}'. Expected 'pretty' or 'json'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Address the view-layer API listens on
    pub bind_addr: SocketAddr,
    /// Origins allowed by CORS; empty means any origin
    pub allowed_origins: Vec<String>,
    /// Hosts treated like localhost by the capability gate
    pub dev_hosts: Vec<String>,
    /// Optional TOML roster loaded at start-up
    pub family_seed: Option<PathBuf>,
    pub log_format: LogFormat,
    /// Environment assumed until the view layer reports its own
    pub initial_environment: EnvironmentReport,
}

impl DashboardConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = env_str(&lookup, "DASHBOARD_HOST", "localhost");
        Ok(Self {
            bind_addr: env_parse(
                &lookup,
                "DASHBOARD_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
            allowed_origins: env_csv(&lookup, "DASHBOARD_ALLOWED_ORIGINS", &[]),
            dev_hosts: env_csv(&lookup, "DASHBOARD_DEV_HOSTS", &[]),
            family_seed: lookup("DASHBOARD_FAMILY_SEED")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            log_format: LogFormat::from_env(&env_str(
                &lookup,
                "DASHBOARD_LOG_FORMAT",
                "pretty",
            ))?,
            initial_environment: EnvironmentReport {
                secure_context: env_parse(&lookup, "DASHBOARD_SECURE_CONTEXT", false)?,
                host,
                media_apis: MEDIA_CAPTURE_APIS
                    .iter()
                    .take(1)
                    .map(|api| (*api).to_string())
                    .collect(),
                permissions: PermissionsReport::Unavailable,
            },
        })
    }
}

fn env_str(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        None => Ok(default),
    }
}

fn env_csv(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &[&str]) -> Vec<String> {
    match lookup(key) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        None => default.iter().map(|s| (*s).to_string()).collect(),
    }
}
