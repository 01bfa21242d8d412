// Path: crates/scheduler/src/compliance.rs
//! Operator policy and hardware fit, checked right before a node commits to
//! an install.

use fleet_types::app::{AppSpecification, LocalApp, NodeCapability};
use fleet_types::config::ComplianceConfig;
use thiserror::Error;

/// Why a candidate failed the compliance check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComplianceFailure {
    /// A public port is blocked by the operator.
    #[error("port {0} is blocked on this node")]
    BlockedPort(u16),
    /// An image matches a blocked repository.
    #[error("image {0} is blocked on this node")]
    BlockedImage(String),
    /// An allow-list is configured and the image matches none of it.
    #[error("image {0} is not on the allow-list")]
    ImageNotAllowed(String),
    /// The app only runs on restricted OS nodes.
    #[error("app requires a restricted OS node")]
    RestrictedOs,
    /// Not enough free hardware after the locally installed apps.
    #[error("insufficient {resource}: needs {needed}, {free} free")]
    Hardware {
        /// `cpu`, `ram` or `hdd`.
        resource: &'static str,
        /// Amount the app needs.
        needed: f64,
        /// Amount left on this node.
        free: f64,
    },
}

impl ComplianceFailure {
    /// A stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BlockedPort(_) => "blocked_port",
            Self::BlockedImage(_) => "blocked_image",
            Self::ImageNotAllowed(_) => "image_not_allowed",
            Self::RestrictedOs => "restricted_os",
            Self::Hardware { .. } => "hardware",
        }
    }
}

fn repository_matches(image: &str, prefix: &str) -> bool {
    !prefix.is_empty() && image.starts_with(prefix)
}

/// Runs every check against `spec` for a node with `capability` that already
/// runs `installed`.
pub fn check(
    spec: &AppSpecification,
    config: &ComplianceConfig,
    capability: &NodeCapability,
    installed: &[LocalApp],
) -> Result<(), ComplianceFailure> {
    if let Some(port) = spec
        .public_ports()
        .into_iter()
        .find(|p| config.blocked_ports.contains(p))
    {
        return Err(ComplianceFailure::BlockedPort(port));
    }
    for component in spec.components() {
        let image = component.repotag;
        if config
            .blocked_repositories
            .iter()
            .any(|b| repository_matches(&image, b))
        {
            return Err(ComplianceFailure::BlockedImage(image));
        }
        if !config.allowed_repositories.is_empty()
            && !config
                .allowed_repositories
                .iter()
                .any(|a| repository_matches(&image, a))
        {
            return Err(ComplianceFailure::ImageNotAllowed(image));
        }
    }
    if spec.restricted_os_only && !capability.restricted_os {
        return Err(ComplianceFailure::RestrictedOs);
    }

    let (used_cpu, used_ram, used_hdd) = installed
        .iter()
        .filter(|a| a.spec.name != spec.name)
        .map(|a| a.spec.resources())
        .fold((0.0, 0u64, 0u64), |(c, r, h), (dc, dr, dh)| {
            (c + dc, r + dr, h + dh)
        });
    let (cpu, ram, hdd) = spec.resources();
    let fits = [
        ("cpu", cpu, capability.cpu_cores - used_cpu),
        ("ram", ram as f64, capability.ram_mb as f64 - used_ram as f64),
        ("hdd", hdd as f64, capability.hdd_gb as f64 - used_hdd as f64),
    ];
    for (resource, needed, free) in fits {
        if needed > free {
            return Err(ComplianceFailure::Hardware {
                resource,
                needed,
                free,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::app::{CapacityTier, ComponentSpec};

    fn spec(image: &str, port: u16, cpu: f64) -> AppSpecification {
        AppSpecification {
            version: 7,
            name: "web".into(),
            compose: vec![ComponentSpec {
                name: "main".into(),
                repotag: image.into(),
                ports: vec![port],
                container_ports: vec![80],
                domains: Vec::new(),
                container_data: String::new(),
                cpu,
                ram: 1_000,
                hdd: 10,
            }],
            ..AppSpecification::default()
        }
    }

    fn node() -> NodeCapability {
        NodeCapability {
            healthy: true,
            tier: CapacityTier::Common,
            storage_only: false,
            restricted_os: false,
            cpu_cores: 4.0,
            ram_mb: 8_000,
            hdd_gb: 200,
        }
    }

    #[test]
    fn operator_policy() {
        let config = ComplianceConfig {
            blocked_ports: vec![31000],
            allowed_repositories: vec!["trusted/".into()],
            blocked_repositories: vec!["trusted/bad".into()],
        };
        assert_eq!(
            check(&spec("trusted/ok:1", 31000, 1.0), &config, &node(), &[]),
            Err(ComplianceFailure::BlockedPort(31000))
        );
        assert_eq!(
            check(&spec("trusted/bad:1", 31001, 1.0), &config, &node(), &[]),
            Err(ComplianceFailure::BlockedImage("trusted/bad:1".into()))
        );
        assert_eq!(
            check(&spec("random/app:1", 31001, 1.0), &config, &node(), &[]),
            Err(ComplianceFailure::ImageNotAllowed("random/app:1".into()))
        );
        assert!(check(&spec("trusted/ok:1", 31001, 1.0), &config, &node(), &[]).is_ok());
    }

    #[test]
    fn restricted_os_apps_need_restricted_nodes() {
        let mut s = spec("a/b:1", 31000, 1.0);
        s.restricted_os_only = true;
        let config = ComplianceConfig::default();
        assert_eq!(
            check(&s, &config, &node(), &[]),
            Err(ComplianceFailure::RestrictedOs)
        );
        let mut restricted = node();
        restricted.restricted_os = true;
        assert!(check(&s, &config, &restricted, &[]).is_ok());
    }

    #[test]
    fn hardware_fit_counts_installed_apps() {
        let config = ComplianceConfig::default();
        let mut other = spec("a/b:1", 31001, 3.5);
        other.name = "other".into();
        let installed = vec![LocalApp {
            spec: other,
            installed_at: 0,
        }];
        let err = check(&spec("a/b:1", 31000, 1.0), &config, &node(), &installed).unwrap_err();
        assert_eq!(err.label(), "hardware");
        assert!(check(&spec("a/b:1", 31000, 0.5), &config, &node(), &installed).is_ok());
    }
}
