// Path: crates/sync/src/pricing.rs
//! The default linear resource pricing.

use fleet_api::pricing::Pricing;
use fleet_types::app::{AppSpecification, PriceFork};
use fleet_types::error::SyncError;
use fleet_types::Height;

/// Prices CPU, memory and storage linearly against the fork's rates.
///
/// Instances beyond the free tier scale the price proportionally. Static IP
/// and enterprise placements add flat surcharges.
#[derive(Debug, Clone, Copy)]
pub struct LinearPricing {
    free_instances: u32,
}

impl LinearPricing {
    /// Creates a pricing with `free_instances` included in the base price.
    pub fn new(free_instances: u32) -> Self {
        Self {
            free_instances: free_instances.max(1),
        }
    }
}

impl Pricing for LinearPricing {
    fn price_for(
        &self,
        spec: &AppSpecification,
        _height: Height,
        fork: &PriceFork,
    ) -> Result<f64, SyncError> {
        let mut price = 0.0;
        for c in spec.components() {
            if !(c.cpu.is_finite() && c.cpu >= 0.0) {
                return Err(SyncError::Pricing(format!(
                    "component {} has invalid cpu {}",
                    c.name, c.cpu
                )));
            }
            price += c.cpu * fork.cpu + (c.ram as f64 / 100.0) * fork.ram + c.hdd as f64 * fork.hdd;
        }
        let instances = spec.required_replicas(self.free_instances);
        if instances > self.free_instances {
            price *= f64::from(instances) / f64::from(self.free_instances);
        }
        if spec.staticip {
            price += fork.static_ip;
        }
        if spec.is_enterprise() {
            price += fork.enterprise;
        }
        Ok(price)
    }
}
