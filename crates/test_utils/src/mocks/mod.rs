// Path: crates/test_utils/src/mocks/mod.rs
//! In-memory doubles of the fleet collaborator traits.

mod ledger;
mod node;
mod sink;
mod transport;
mod validator;

pub use ledger::MockLedger;
pub use node::{MockProbe, MockRuntime};
pub use sink::RecordingSink;
pub use transport::MockTransport;
pub use validator::MockValidator;
