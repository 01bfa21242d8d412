// Path: crates/registry/src/locations.rs
//! Gossiped placement state: which node runs, is installing, or failed to
//! install which application.
//!
//! Every row is keyed by `(name, ip)` and carries a local `expire_at` derived
//! from its broadcast time, so a node that stops refreshing its claims drops
//! out of the replica counts on its own.

use fleet_api::clock::Clock;
use fleet_storage::Collections;
use fleet_types::app::{InstallErrorRecord, InstallingAnnouncement, LocationRecord, RemovedNotice};
use fleet_types::config::RegistryConfig;
use fleet_types::error::RegistryError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reads and writes the location, installing and install-error collections.
#[derive(Clone)]
pub struct LocationBook {
    config: RegistryConfig,
    collections: Collections,
    clock: Arc<dyn Clock>,
}

impl LocationBook {
    /// Creates a book over `collections`.
    pub fn new(config: RegistryConfig, collections: Collections, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            collections,
            clock,
        }
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Records a running claim. Older or already expired claims are ignored.
    pub fn on_running(&self, mut record: LocationRecord) -> Result<bool, RegistryError> {
        record.expire_at = record
            .broadcasted_at
            .saturating_add(self.config.running_location_ttl_ms());
        if record.expire_at < self.now() {
            return Ok(false);
        }
        if let Some(current) = self.collections.location(&record.name, &record.ip)? {
            if current.broadcasted_at >= record.broadcasted_at {
                return Ok(false);
            }
        }
        self.collections.upsert_location(&record)?;
        self.collections.delete_installing(&record.name, &record.ip)?;
        tracing::debug!(target: "registry", name = %record.name, ip = %record.ip, "running claim recorded");
        Ok(true)
    }

    /// Records an installing announcement.
    pub fn on_installing(&self, mut a: InstallingAnnouncement) -> Result<bool, RegistryError> {
        a.expire_at = a
            .broadcasted_at
            .saturating_add(self.config.installing_ttl_ms());
        if a.expire_at < self.now() {
            return Ok(false);
        }
        self.collections.upsert_installing(&a)?;
        tracing::debug!(target: "registry", name = %a.name, ip = %a.ip, broadcasted_at = a.broadcasted_at, "installing announcement recorded");
        Ok(true)
    }

    /// Records an install failure; the failing node no longer counts as installing.
    pub fn on_install_error(&self, mut e: InstallErrorRecord) -> Result<bool, RegistryError> {
        e.expire_at = e.broadcasted_at.saturating_add(self.config.error_ttl_ms());
        if e.expire_at < self.now() {
            return Ok(false);
        }
        self.collections.upsert_install_error(&e)?;
        self.collections.delete_installing(&e.name, &e.ip)?;
        tracing::debug!(target: "registry", name = %e.name, ip = %e.ip, error = %e.error, "install error recorded");
        Ok(true)
    }

    /// Drops the running claim a removal notice refers to, unless the claim is newer.
    pub fn on_removed(&self, notice: RemovedNotice) -> Result<bool, RegistryError> {
        let Some(current) = self.collections.location(&notice.name, &notice.ip)? else {
            return Ok(false);
        };
        if current.broadcasted_at > notice.broadcasted_at {
            return Ok(false);
        }
        self.collections.delete_location(&notice.name, &notice.ip)?;
        tracing::debug!(target: "registry", name = %notice.name, ip = %notice.ip, "running claim removed");
        Ok(true)
    }

    /// Live running claims for `name`, longest running first.
    pub fn running(&self, name: &str) -> Result<Vec<LocationRecord>, RegistryError> {
        Ok(self.collections.locations(Some(name), self.now())?)
    }

    /// Every live running claim.
    pub fn all_running(&self) -> Result<Vec<LocationRecord>, RegistryError> {
        Ok(self.collections.locations(None, self.now())?)
    }

    /// Live installing announcements for `name`, earliest first.
    pub fn installing(&self, name: &str) -> Result<Vec<InstallingAnnouncement>, RegistryError> {
        Ok(self.collections.installing(name, self.now())?)
    }

    /// Live install failures for `name`.
    pub fn install_errors(&self, name: &str) -> Result<Vec<InstallErrorRecord>, RegistryError> {
        Ok(self.collections.install_errors(name, self.now())?)
    }

    /// Live running replica count per application.
    pub fn running_counts(&self) -> Result<BTreeMap<String, u32>, RegistryError> {
        let mut counts = BTreeMap::new();
        for record in self.all_running()? {
            *counts.entry(record.name).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Deletes expired rows of every book.
    pub fn purge_expired(&self) -> Result<usize, RegistryError> {
        let removed = self.collections.purge_expired(self.now())?;
        if removed > 0 {
            tracing::debug!(target: "registry", removed, "purged expired placement rows");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_test_utils::clock::ManualClock;
    use fleet_test_utils::fixtures::memory_collections;

    const NOW: u64 = 10_000_000;

    fn book() -> (LocationBook, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let book = LocationBook::new(RegistryConfig::default(), memory_collections(), clock.clone());
        (book, clock)
    }

    fn running(name: &str, ip: &str, at: u64) -> LocationRecord {
        LocationRecord {
            name: name.into(),
            hash: "h".into(),
            ip: ip.into(),
            broadcasted_at: at,
            expire_at: 0,
            running_since: at,
        }
    }

    #[test]
    fn newer_claim_wins() {
        let (book, _) = book();
        assert!(book.on_running(running("web", "10.0.0.1", NOW - 10)).unwrap());
        assert!(!book.on_running(running("web", "10.0.0.1", NOW - 20)).unwrap());
        assert!(book.on_running(running("web", "10.0.0.1", NOW)).unwrap());
        let rows = book.running("web").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].broadcasted_at, NOW);
    }

    #[test]
    fn stale_claims_are_ignored_and_expire() {
        let (book, clock) = book();
        let ttl = RegistryConfig::default().running_location_ttl_ms();
        assert!(!book.on_running(running("web", "10.0.0.1", NOW - ttl - 1)).unwrap());
        assert!(book.on_running(running("web", "10.0.0.2", NOW)).unwrap());
        assert_eq!(book.running_counts().unwrap().get("web"), Some(&1));

        clock.set(NOW + ttl + 1);
        assert!(book.running("web").unwrap().is_empty());
        assert_eq!(book.purge_expired().unwrap(), 1);
    }

    #[test]
    fn removal_notice_respects_newer_claims() {
        let (book, _) = book();
        book.on_running(running("web", "10.0.0.1", NOW)).unwrap();
        let notice = RemovedNotice {
            name: "web".into(),
            ip: "10.0.0.1".into(),
            broadcasted_at: NOW - 1,
        };
        assert!(!book.on_removed(notice.clone()).unwrap());
        assert!(book
            .on_removed(RemovedNotice {
                broadcasted_at: NOW + 1,
                ..notice
            })
            .unwrap());
        assert!(book.running("web").unwrap().is_empty());
    }

    #[test]
    fn running_and_errors_clear_installing() {
        let (book, _) = book();
        for ip in ["10.0.0.1", "10.0.0.2"] {
            book.on_installing(InstallingAnnouncement {
                name: "web".into(),
                ip: ip.into(),
                broadcasted_at: NOW,
                expire_at: 0,
            })
            .unwrap();
        }
        assert_eq!(book.installing("web").unwrap().len(), 2);

        book.on_running(running("web", "10.0.0.1", NOW)).unwrap();
        book.on_install_error(InstallErrorRecord {
            name: "web".into(),
            hash: "h".into(),
            ip: "10.0.0.2".into(),
            error: "pull failed".into(),
            broadcasted_at: NOW,
            expire_at: 0,
        })
        .unwrap();

        assert!(book.installing("web").unwrap().is_empty());
        assert_eq!(book.install_errors("web").unwrap().len(), 1);
    }
}
