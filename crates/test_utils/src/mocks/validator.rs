// Path: crates/test_utils/src/mocks/validator.rs
use async_trait::async_trait;
use fleet_api::pricing::SpecValidator;
use fleet_types::app::AppSpecification;
use fleet_types::error::SyncError;
use fleet_types::Height;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Accepts every specification except those whose name was marked invalid.
#[derive(Debug, Default)]
pub struct MockValidator {
    rejected: Mutex<HashSet<String>>,
}

impl MockValidator {
    /// Accepts everything.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Rejects specifications named `name` from now on.
    pub fn reject(&self, name: &str) {
        self.rejected.lock().insert(name.to_string());
    }
}

#[async_trait]
impl SpecValidator for MockValidator {
    async fn verify(&self, spec: &AppSpecification, _height: Height) -> Result<(), SyncError> {
        if self.rejected.lock().contains(&spec.name) {
            return Err(SyncError::InvalidSpec(format!("{} is rejected", spec.name)));
        }
        Ok(())
    }
}
