// Path: crates/sync/src/validation.rs
//! Structural checks applied to every specification before it is stored.

use async_trait::async_trait;
use fleet_api::pricing::SpecValidator;
use fleet_types::app::AppSpecification;
use fleet_types::error::SyncError;
use fleet_types::Height;
use std::collections::HashSet;

const MAX_NAME_LEN: usize = 32;
const MAX_INSTANCES: u32 = 100;
const MAX_COMPONENTS: usize = 10;

/// Rejects specifications that no node could ever run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

fn invalid(reason: String) -> SyncError {
    SyncError::InvalidSpec(reason)
}

fn check_name(kind: &str, name: &str) -> Result<(), SyncError> {
    let well_formed = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric())
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        Err(invalid(format!("{kind} name {name:?} is not a valid identifier")))
    }
}

#[async_trait]
impl SpecValidator for StructuralValidator {
    async fn verify(&self, spec: &AppSpecification, _height: Height) -> Result<(), SyncError> {
        check_name("app", &spec.name)?;
        if spec.owner.is_empty() {
            return Err(invalid(format!("{} has no owner", spec.name)));
        }
        if let Some(instances) = spec.instances {
            if instances == 0 || instances > MAX_INSTANCES {
                return Err(invalid(format!(
                    "{} requests {instances} instances, allowed 1..={MAX_INSTANCES}",
                    spec.name
                )));
            }
        }

        let components = spec.components();
        if components.is_empty() || components.len() > MAX_COMPONENTS {
            return Err(invalid(format!(
                "{} has {} components, allowed 1..={MAX_COMPONENTS}",
                spec.name,
                components.len()
            )));
        }
        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for c in &components {
            check_name("component", &c.name)?;
            if !names.insert(c.name.as_str()) {
                return Err(invalid(format!("duplicate component {}", c.name)));
            }
            if c.repotag.trim().is_empty() {
                return Err(invalid(format!("component {} has no image", c.name)));
            }
            if c.ports.len() != c.container_ports.len() {
                return Err(invalid(format!(
                    "component {} maps {} public ports onto {} container ports",
                    c.name,
                    c.ports.len(),
                    c.container_ports.len()
                )));
            }
            for port in &c.ports {
                if *port == 0 || !ports.insert(*port) {
                    return Err(invalid(format!(
                        "port {port} of component {} is zero or already used",
                        c.name
                    )));
                }
            }
            if !(c.cpu.is_finite() && c.cpu > 0.0) || c.ram == 0 || c.hdd == 0 {
                return Err(invalid(format!(
                    "component {} needs positive cpu, ram and hdd",
                    c.name
                )));
            }
        }
        Ok(())
    }
}
