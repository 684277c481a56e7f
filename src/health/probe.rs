//! Process and data store liveness snapshot.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use serde::Serialize;

use crate::config::Environment;
use crate::store::DataStore;

/// Overall liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub free: String,
    pub total: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub memory: Option<MemoryInfo>,
    pub cpus: usize,
    pub platform: &'static str,
    pub load_avg: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationInfo {
    pub environment: Environment,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    /// `connected` or `disconnected`.
    pub status: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub database: DatabaseStatus,
}

/// Point-in-time health report served at `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub timestamp: String,
    pub uptime: String,
    pub system: SystemInfo,
    pub application: ApplicationInfo,
    pub services: ServiceStatus,
}

impl HealthSnapshot {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Up => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Reads liveness without side effects.
pub struct HealthProbe {
    store: Arc<dyn DataStore>,
    started: Instant,
    environment: Environment,
}

impl HealthProbe {
    pub fn new(store: Arc<dyn DataStore>, environment: Environment) -> Self {
        Self {
            store,
            started: Instant::now(),
            environment,
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let ready = self.store.is_ready();

        HealthSnapshot {
            status: if ready { HealthStatus::Up } else { HealthStatus::Down },
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            uptime: format!("{} seconds", self.started.elapsed().as_secs()),
            system: SystemInfo {
                memory: read_memory(),
                cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
                platform: std::env::consts::OS,
                load_avg: read_load_avg(),
            },
            application: ApplicationInfo {
                environment: self.environment,
                version: env!("CARGO_PKG_VERSION"),
            },
            services: ServiceStatus {
                database: DatabaseStatus {
                    status: if ready { "connected" } else { "disconnected" },
                    name: self.store.name().to_string(),
                },
            },
        }
    }
}

/// Free and total memory from `/proc/meminfo`; `None` where unavailable.
fn read_memory() -> Option<MemoryInfo> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&meminfo)
}

fn parse_meminfo(meminfo: &str) -> Option<MemoryInfo> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|kb| kb.parse().ok())
    };

    let total_kb = field("MemTotal")?;
    let free_kb = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some(MemoryInfo {
        free: format!("{} MB", free_kb / 1024),
        total: format!("{} MB", total_kb / 1024),
    })
}

fn read_load_avg() -> Option<[f64; 3]> {
    let raw = std::fs::read_to_string("/proc/loadavg").ok()?;
    let mut parts = raw.split_whitespace().map(|p| p.parse::<f64>().ok());
    Some([parts.next()??, parts.next()??, parts.next()??])
}
