//! Liveness reporting for the long-running pieces of each service.
//!
//! Components register against a process-wide registry and flip their own
//! status as they make progress; `/_liveness` renders the combined view.
//! The process is healthy only once every registered component has
//! reported healthy at least once and none has reported unhealthy since.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentStatus {
    /// Set on registration, before the first report.
    Starting,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Default)]
pub struct HealthStatus {
    pub healthy: bool,
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> Response {
        let body = format!("{self:?}");
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

type Components = Arc<RwLock<HashMap<String, ComponentStatus>>>;

#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Components,
}

impl HealthRegistry {
    pub fn new(name: &str) -> HealthRegistry {
        HealthRegistry {
            name: name.to_owned(),
            components: Default::default(),
        }
    }

    /// Registers a component as Starting and hands back the handle it
    /// should report through. Re-registering a name resets its status.
    pub fn register(&self, component: &str) -> HealthHandle {
        let handle = HealthHandle {
            component: component.to_owned(),
            components: self.components.clone(),
        };
        handle.report(ComponentStatus::Starting);
        handle
    }

    pub fn get_status(&self) -> HealthStatus {
        let components = match self.components.read() {
            Ok(components) => components.clone(),
            Err(_) => {
                warn!("poisoned health registry lock");
                return HealthStatus::default();
            }
        };
        let healthy = !components.is_empty()
            && components
                .values()
                .all(|status| *status == ComponentStatus::Healthy);
        if !healthy {
            warn!("{} health check failed: {:?}", self.name, components);
        }
        HealthStatus {
            healthy,
            components,
        }
    }
}

#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    components: Components,
}

impl HealthHandle {
    pub fn report_healthy(&self) {
        self.report(ComponentStatus::Healthy);
    }

    pub fn report_unhealthy(&self) {
        self.report(ComponentStatus::Unhealthy);
    }

    fn report(&self, status: ComponentStatus) {
        match self.components.write() {
            Ok(mut components) => {
                components.insert(self.component.clone(), status);
            }
            Err(_) => warn!("poisoned health registry lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_is_unhealthy() {
        let registry = HealthRegistry::new("liveness");
        assert!(!registry.get_status().healthy);
    }

    #[test]
    fn component_must_report_before_process_is_healthy() {
        let registry = HealthRegistry::new("liveness");
        let handle = registry.register("turn_loop");
        assert!(!registry.get_status().healthy);

        handle.report_healthy();
        assert!(registry.get_status().healthy);

        handle.report_unhealthy();
        let status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("turn_loop"),
            Some(&ComponentStatus::Unhealthy)
        );
    }

    #[test]
    fn one_sick_component_takes_the_process_down() {
        let registry = HealthRegistry::new("liveness");
        let first = registry.register("server");
        let second = registry.register("turn_loop");

        first.report_healthy();
        assert!(!registry.get_status().healthy);

        second.report_healthy();
        assert!(registry.get_status().healthy);

        second.report_unhealthy();
        assert!(!registry.get_status().healthy);
    }
}
