// Path: crates/test_utils/src/mocks/ledger.rs
use async_trait::async_trait;
use fleet_api::ledger::Ledger;
use fleet_types::app::LedgerStatus;
use fleet_types::error::TransportError;
use fleet_types::Height;
use parking_lot::Mutex;

/// A ledger whose status and node confirmation are set by the test.
#[derive(Debug)]
pub struct MockLedger {
    status: Mutex<LedgerStatus>,
    confirmed: Mutex<bool>,
}

impl MockLedger {
    /// A synced ledger at `height` that confirms this node.
    pub fn at_height(height: Height) -> Self {
        Self {
            status: Mutex::new(LedgerStatus {
                synced: true,
                height,
            }),
            confirmed: Mutex::new(true),
        }
    }

    /// Sets the best height.
    pub fn set_height(&self, height: Height) {
        self.status.lock().height = height;
    }

    /// Sets the synced flag.
    pub fn set_synced(&self, synced: bool) {
        self.status.lock().synced = synced;
    }

    /// Sets whether this node is confirmed.
    pub fn set_confirmed(&self, confirmed: bool) {
        *self.confirmed.lock() = confirmed;
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn sync_status(&self) -> Result<LedgerStatus, TransportError> {
        Ok(*self.status.lock())
    }

    async fn is_node_confirmed(&self, _address: &str) -> Result<bool, TransportError> {
        Ok(*self.confirmed.lock())
    }
}
