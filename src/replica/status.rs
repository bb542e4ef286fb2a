use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::RwLock;

/// Liveness and readiness flags for an external probe layer.
pub struct HealthStatus {
    flags: RwLock<Flags>,
    started: DateTime<Utc>,
}

#[derive(Copy, Clone, Default)]
struct Flags {
    healthy: bool,
    ready: bool,
    maintenance: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Health {
    Ok,
    NotReady,
    Unhealthy,
    Maintenance,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Health::Ok => "ok",
            Health::NotReady => "not ready",
            Health::Unhealthy => "unhealthy",
            Health::Maintenance => "maintenance",
        })
    }
}

impl HealthStatus {
    pub fn new() -> Self {
        HealthStatus {
            flags: RwLock::new(Flags::default()),
            started: Utc::now(),
        }
    }

    pub fn status(&self) -> Health {
        let flags = *self.flags.read().expect("HealthStatus.status() rwlock guard poison");
        match flags {
            Flags { maintenance: true, .. } => Health::Maintenance,
            Flags { healthy: false, .. } => Health::Unhealthy,
            Flags { ready: false, .. } => Health::NotReady,
            _ => Health::Ok,
        }
    }

    /// Liveness: `Ok` or `Unhealthy`.
    pub fn healthz(&self) -> Health {
        if self.flags.read().expect("HealthStatus.healthz() rwlock guard poison").healthy {
            Health::Ok
        } else {
            Health::Unhealthy
        }
    }

    /// Readiness: `Ok` or `NotReady`.
    pub fn readyz(&self) -> Health {
        if self.flags.read().expect("HealthStatus.readyz() rwlock guard poison").ready {
            Health::Ok
        } else {
            Health::NotReady
        }
    }

    pub fn uptime(&self) -> Duration {
        Utc::now() - self.started
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.flags.write().expect("HealthStatus.set_healthy() rwlock guard poison").healthy = healthy;
    }

    pub fn set_ready(&self, ready: bool) {
        self.flags.write().expect("HealthStatus.set_ready() rwlock guard poison").ready = ready;
    }

    pub fn set_maintenance(&self, maintenance: bool) {
        self.flags
            .write()
            .expect("HealthStatus.set_maintenance() rwlock guard poison")
            .maintenance = maintenance;
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_precedence() {
        let status = HealthStatus::new();
        assert_eq!(status.status(), Health::Unhealthy);
        assert_eq!(status.readyz(), Health::NotReady);

        status.set_healthy(true);
        assert_eq!(status.status(), Health::NotReady);
        assert_eq!(status.healthz(), Health::Ok);

        status.set_ready(true);
        assert_eq!(status.status(), Health::Ok);
        assert_eq!(status.status().to_string(), "ok");

        status.set_maintenance(true);
        assert_eq!(status.status().to_string(), "maintenance");

        status.set_maintenance(false);
        status.set_healthy(false);
        assert_eq!(status.status().to_string(), "unhealthy");
        assert_eq!(Health::NotReady.to_string(), "not ready");

        assert!(status.uptime() >= Duration::zero());
    }
}
