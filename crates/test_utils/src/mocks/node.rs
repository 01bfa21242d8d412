// Path: crates/test_utils/src/mocks/node.rs
use async_trait::async_trait;
use fleet_api::clock::Clock;
use fleet_api::node::{ContainerRuntime, NodeProbe};
use fleet_types::app::{
    AppSpecification, CapacityTier, LocalApp, NodeCapability, NodeGeo,
};
use fleet_types::error::{RuntimeError, TransportError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// A container runtime that keeps its installed set in memory.
pub struct MockRuntime {
    clock: Arc<dyn Clock>,
    installed: Mutex<Vec<LocalApp>>,
    failing: Mutex<HashSet<String>>,
    installs: Mutex<Vec<String>>,
    removals: Mutex<Vec<String>>,
}

impl MockRuntime {
    /// An empty runtime stamping installs with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            installed: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            installs: Mutex::new(Vec::new()),
            removals: Mutex::new(Vec::new()),
        }
    }

    /// Pretends `spec` is already installed.
    pub fn preinstall(&self, spec: AppSpecification) {
        let installed_at = self.clock.now_ms();
        self.installed.lock().push(LocalApp { spec, installed_at });
    }

    /// Makes installs of `name` fail.
    pub fn fail_installs_of(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    /// Names installed through this runtime, in order.
    pub fn installs(&self) -> Vec<String> {
        self.installs.lock().clone()
    }

    /// Names removed through this runtime, in order.
    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().clone()
    }

    /// Names currently installed.
    pub fn installed_names(&self) -> Vec<String> {
        self.installed
            .lock()
            .iter()
            .map(|a| a.spec.name.clone())
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn installed(&self) -> Result<Vec<LocalApp>, RuntimeError> {
        Ok(self.installed.lock().clone())
    }

    async fn install(&self, spec: &AppSpecification) -> Result<(), RuntimeError> {
        self.installs.lock().push(spec.name.clone());
        if self.failing.lock().contains(&spec.name) {
            return Err(RuntimeError::Install {
                name: spec.name.clone(),
                reason: "image pull failed".into(),
            });
        }
        self.preinstall(spec.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.removals.lock().push(name.to_string());
        self.installed.lock().retain(|a| a.spec.name != name);
        Ok(())
    }
}

/// A node probe with settable answers.
#[derive(Debug)]
pub struct MockProbe {
    capability: Mutex<NodeCapability>,
    address: Mutex<Option<String>>,
    geo: Mutex<Option<NodeGeo>>,
    unreachable_ports: Mutex<HashSet<u16>>,
    busy_ports: Mutex<HashSet<u16>>,
}

impl MockProbe {
    /// A healthy common-tier node at `address` with ample free hardware.
    pub fn healthy(address: &str) -> Self {
        Self {
            capability: Mutex::new(NodeCapability {
                healthy: true,
                tier: CapacityTier::Common,
                storage_only: false,
                restricted_os: false,
                cpu_cores: 8.0,
                ram_mb: 32_000,
                hdd_gb: 500,
            }),
            address: Mutex::new(Some(address.to_string())),
            geo: Mutex::new(Some(NodeGeo {
                continent: "EU".into(),
                country: "CZ".into(),
                region: None,
            })),
            unreachable_ports: Mutex::new(HashSet::new()),
            busy_ports: Mutex::new(HashSet::new()),
        }
    }

    /// Replaces the capability report.
    pub fn update_capability(&self, f: impl FnOnce(&mut NodeCapability)) {
        f(&mut self.capability.lock());
    }

    /// Sets the public address.
    pub fn set_address(&self, address: Option<&str>) {
        *self.address.lock() = address.map(str::to_string);
    }

    /// Sets the geolocation.
    pub fn set_geo(&self, geo: Option<NodeGeo>) {
        *self.geo.lock() = geo;
    }

    /// Makes `port` unreachable from outside.
    pub fn block_port(&self, port: u16) {
        self.unreachable_ports.lock().insert(port);
    }

    /// Marks `port` as bound locally.
    pub fn occupy_port(&self, port: u16) {
        self.busy_ports.lock().insert(port);
    }
}

#[async_trait]
impl NodeProbe for MockProbe {
    async fn capability(&self) -> Result<NodeCapability, TransportError> {
        Ok(self.capability.lock().clone())
    }

    async fn public_address(&self) -> Result<Option<String>, TransportError> {
        Ok(self.address.lock().clone())
    }

    async fn port_reachable(&self, port: u16) -> Result<bool, TransportError> {
        Ok(!self.unreachable_ports.lock().contains(&port))
    }

    async fn port_free_locally(&self, port: u16) -> Result<bool, TransportError> {
        Ok(!self.busy_ports.lock().contains(&port))
    }

    async fn geolocation(&self) -> Result<Option<NodeGeo>, TransportError> {
        Ok(self.geo.lock().clone())
    }
}
