// Path: crates/types/src/app/mod.rs
//! Application-level data structures shared by every fleet subsystem.

mod message;
mod node;
mod placement;
mod spec;

pub use message::*;
pub use node::*;
pub use placement::*;
pub use spec::*;

/// Returns the host part of a `host[:port]` node address.
pub fn host_of(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => address,
    }
}

/// Returns true if two node addresses refer to the same host, ignoring ports.
pub fn same_host(a: &str, b: &str) -> bool {
    host_of(a) == host_of(b)
}
