// Path: crates/api/src/pricing.rs
use async_trait::async_trait;
use fleet_types::app::{AppSpecification, PriceFork};
use fleet_types::error::SyncError;
use fleet_types::Height;

/// Computes the resource price of a specification.
pub trait Pricing: Send + Sync {
    /// Price in coins for `spec` under the table row `fork`, before any
    /// expiry multiplier, rounding or minimum is applied.
    fn price_for(
        &self,
        spec: &AppSpecification,
        height: Height,
        fork: &PriceFork,
    ) -> Result<f64, SyncError>;
}

/// Validates a specification against the rules in force at a height.
#[async_trait]
pub trait SpecValidator: Send + Sync {
    /// Returns `SyncError::InvalidSpec` if the specification is not acceptable.
    async fn verify(&self, spec: &AppSpecification, height: Height) -> Result<(), SyncError>;
}
