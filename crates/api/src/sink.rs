// Path: crates/api/src/sink.rs
use async_trait::async_trait;
use fleet_types::app::AppMessage;
use fleet_types::error::RegistryError;

/// Receives messages the sync engine has accepted into permanent storage.
#[async_trait]
pub trait RegistrySink: Send + Sync {
    /// Folds an accepted message into the registry on the live intake path.
    async fn apply_live(&self, message: &AppMessage) -> Result<(), RegistryError>;
}
