// Path: crates/scheduler/src/ranking.rs
//! Orders competing installing announcements for one application.
//!
//! Earlier broadcasts rank first; equal timestamps are ordered by address so
//! every node computes the same order from the same announcements.

use fleet_types::app::InstallingAnnouncement;

/// Sorts announcements into rank order.
pub fn rank(announcements: &mut [InstallingAnnouncement]) {
    announcements.sort_by(|a, b| {
        a.broadcasted_at
            .cmp(&b.broadcasted_at)
            .then_with(|| a.ip.cmp(&b.ip))
    });
}

/// Zero-based rank of `ip` among `announcements`, if it announced.
pub fn position(announcements: &[InstallingAnnouncement], ip: &str) -> Option<usize> {
    let mut ranked = announcements.to_vec();
    rank(&mut ranked);
    ranked.iter().position(|a| a.ip == ip)
}

/// Decides whether the node at `ip` may go ahead with its install.
///
/// If running replicas plus announced installs fit within `required`, every
/// announcer proceeds. Otherwise only announcers whose rank keeps the
/// committed count within `required` proceed; a node missing from the
/// announcements ranks last.
pub fn may_proceed(
    running: usize,
    announcements: &[InstallingAnnouncement],
    ip: &str,
    required: usize,
) -> bool {
    if running + announcements.len() <= required {
        return true;
    }
    let rank = position(announcements, ip).unwrap_or(announcements.len());
    running + rank < required
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announce(ip: &str, at: u64) -> InstallingAnnouncement {
        InstallingAnnouncement {
            name: "web".into(),
            ip: ip.into(),
            broadcasted_at: at,
            expire_at: 0,
        }
    }

    #[test]
    fn later_announcer_backs_off_when_one_slot_is_left() {
        let both = vec![announce("10.0.0.2", 2_000), announce("10.0.0.1", 1_000)];
        assert!(may_proceed(2, &both, "10.0.0.1", 3));
        assert!(!may_proceed(2, &both, "10.0.0.2", 3));
    }

    #[test]
    fn everyone_proceeds_when_the_deficit_covers_all() {
        let both = vec![announce("10.0.0.2", 2_000), announce("10.0.0.1", 1_000)];
        assert!(may_proceed(1, &both, "10.0.0.2", 3));
    }

    #[test]
    fn ties_break_by_address() {
        let tied = vec![announce("10.0.0.9", 1_000), announce("10.0.0.3", 1_000)];
        assert_eq!(position(&tied, "10.0.0.3"), Some(0));
        assert!(may_proceed(2, &tied, "10.0.0.3", 3));
        assert!(!may_proceed(2, &tied, "10.0.0.9", 3));
    }

    #[test]
    fn missing_announcement_ranks_last() {
        let others = vec![announce("10.0.0.2", 1_000), announce("10.0.0.3", 1_000)];
        assert!(!may_proceed(2, &others, "10.0.0.1", 3));
    }
}
