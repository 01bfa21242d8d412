// Path: crates/storage/src/collections.rs
//! Typed access to the named collections shared by the fleet subsystems.

use crate::{from_document, to_document};
use fleet_api::store::{DocumentStore, Filter, FindOptions, SortOrder};
use fleet_types::app::{
    AppMessage, AppSpecification, HashRecord, InstallErrorRecord, InstallingAnnouncement,
    LocationRecord, StoredMessage, TemporaryMessage,
};
use fleet_types::error::StoreError;
use fleet_types::{Height, TimestampMs};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

/// On-chain anchors and whether their content is held.
pub const HASH_RECORDS: &str = "hash_records";
/// Anchored messages, kept forever.
pub const PERMANENT_MESSAGES: &str = "permanent_messages";
/// Unanchored messages received over gossip.
pub const TEMPORARY_MESSAGES: &str = "temporary_messages";
/// Current specification per application name.
pub const REGISTRY: &str = "registry";
/// Running-replica claims.
pub const LOCATIONS: &str = "locations";
/// Installing announcements.
pub const INSTALLING: &str = "installing";
/// Install failures.
pub const INSTALL_ERRORS: &str = "install_errors";

fn by_hash(hash: &str) -> Filter {
    Filter::all().eq("hash", hash)
}

fn by_name(name: &str) -> Filter {
    Filter::all().eq("name", name)
}

fn by_name_ip(name: &str, ip: &str) -> Filter {
    Filter::all().eq("name", name).eq("ip", ip)
}

/// A typed facade over a [`DocumentStore`].
#[derive(Clone)]
pub struct Collections {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Collections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collections").finish_non_exhaustive()
    }
}

impl Collections {
    /// Wraps a store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn find_typed<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<T>, StoreError> {
        self.store
            .find(collection, filter, &[], options)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    fn find_one_typed<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<T>, StoreError> {
        self.store
            .find_one(collection, filter)?
            .map(from_document)
            .transpose()
    }

    // --- hash records ---

    /// Inserts a record unless one exists for the same hash. Returns true if inserted.
    pub fn insert_hash_record(&self, record: &HashRecord) -> Result<bool, StoreError> {
        self.store
            .insert_absent(HASH_RECORDS, &by_hash(&record.hash), to_document(record)?)
    }

    /// The record for `hash`.
    pub fn hash_record(&self, hash: &str) -> Result<Option<HashRecord>, StoreError> {
        self.find_one_typed(HASH_RECORDS, &by_hash(hash))
    }

    /// Every record, oldest anchor first.
    pub fn hash_records(&self) -> Result<Vec<HashRecord>, StoreError> {
        self.find_typed(HASH_RECORDS, &Filter::all(), &FindOptions::ascending("height"))
    }

    /// Records still lacking content, oldest first. Records given up on are
    /// included only with `include_not_found`.
    pub fn missing_hash_records(
        &self,
        include_not_found: bool,
    ) -> Result<Vec<HashRecord>, StoreError> {
        let mut filter = Filter::all().eq("hasMessage", false);
        if !include_not_found {
            filter = filter.eq("messageNotFound", false);
        }
        self.find_typed(HASH_RECORDS, &filter, &FindOptions::ascending("height"))
    }

    /// Records that can still be resolved: lacking content, not given up on,
    /// and anchored at or above `activation_height`.
    pub fn outstanding_hash_records(&self, activation_height: Height) -> Result<usize, StoreError> {
        let filter = Filter::all()
            .eq("hasMessage", false)
            .eq("messageNotFound", false)
            .gte("height", activation_height);
        self.store.count(HASH_RECORDS, &filter)
    }

    /// Total and missing record counts.
    pub fn hash_record_counts(&self) -> Result<(usize, usize), StoreError> {
        let total = self.store.count(HASH_RECORDS, &Filter::all())?;
        let missing = self
            .store
            .count(HASH_RECORDS, &Filter::all().eq("hasMessage", false))?;
        Ok((total, missing))
    }

    /// Sets `hasMessage` on the record for `hash`.
    pub fn set_has_message(&self, hash: &str, has_message: bool) -> Result<usize, StoreError> {
        let fields = to_document(&json!({ "hasMessage": has_message }))?;
        self.store.update(HASH_RECORDS, &by_hash(hash), fields)
    }

    /// Gives up on the content behind `hash`.
    pub fn mark_not_found(&self, hash: &str) -> Result<usize, StoreError> {
        let fields = to_document(&json!({ "messageNotFound": true }))?;
        self.store.update(HASH_RECORDS, &by_hash(hash), fields)
    }

    // --- permanent messages ---

    /// The permanently stored message for `hash`.
    pub fn permanent_message(&self, hash: &str) -> Result<Option<StoredMessage>, StoreError> {
        self.find_one_typed(PERMANENT_MESSAGES, &by_hash(hash))
    }

    /// True if the permanent store holds `hash`.
    pub fn has_permanent(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.store.count(PERMANENT_MESSAGES, &by_hash(hash))? > 0)
    }

    /// Stores a message permanently. Returns false if the hash was already held.
    pub fn store_permanent(&self, message: &StoredMessage) -> Result<bool, StoreError> {
        self.store.insert_absent(
            PERMANENT_MESSAGES,
            &by_hash(&message.message.hash),
            to_document(message)?,
        )
    }

    /// Accepted (not underpaid) messages at or above `from_height`, in anchor order.
    pub fn accepted_messages(&self, from_height: Height) -> Result<Vec<AppMessage>, StoreError> {
        let filter = Filter::all()
            .eq("underpaid", false)
            .gte("height", from_height);
        let options = FindOptions::ascending("height").then("timestamp", SortOrder::Ascending);
        Ok(self
            .find_typed::<StoredMessage>(PERMANENT_MESSAGES, &filter, &options)?
            .into_iter()
            .map(|m| m.message)
            .collect())
    }

    /// The newest accepted message for `name` anchored strictly below `height`.
    pub fn previous_accepted(
        &self,
        name: &str,
        height: Height,
    ) -> Result<Option<AppMessage>, StoreError> {
        let filter = Filter::all()
            .eq("specification.name", name)
            .eq("underpaid", false)
            .lt("height", height);
        let options = FindOptions::descending("height").limit(1);
        Ok(self
            .find_typed::<StoredMessage>(PERMANENT_MESSAGES, &filter, &options)?
            .into_iter()
            .next()
            .map(|m| m.message))
    }

    /// Every permanently stored message, for peer export.
    pub fn permanent_messages(&self) -> Result<Vec<AppMessage>, StoreError> {
        Ok(self
            .find_typed::<StoredMessage>(
                PERMANENT_MESSAGES,
                &Filter::all(),
                &FindOptions::ascending("height"),
            )?
            .into_iter()
            .map(|m| m.message)
            .collect())
    }

    // --- temporary messages ---

    /// The temporary message for `hash`, if received at or after `fresh_since`.
    pub fn temporary_message(
        &self,
        hash: &str,
        fresh_since: TimestampMs,
    ) -> Result<Option<TemporaryMessage>, StoreError> {
        self.find_one_typed(
            TEMPORARY_MESSAGES,
            &by_hash(hash).gte("receivedAt", fresh_since),
        )
    }

    /// Fresh temporary messages whose hash is one of `hashes`.
    pub fn temporary_messages_for(
        &self,
        hashes: &[String],
        fresh_since: TimestampMs,
    ) -> Result<Vec<TemporaryMessage>, StoreError> {
        let filter = Filter::all()
            .any_of("hash", hashes.iter().map(String::as_str))
            .gte("receivedAt", fresh_since);
        self.find_typed(TEMPORARY_MESSAGES, &filter, &FindOptions::default())
    }

    /// Stores or refreshes a temporary message.
    pub fn store_temporary(&self, message: &TemporaryMessage) -> Result<(), StoreError> {
        self.store.upsert(
            TEMPORARY_MESSAGES,
            &by_hash(&message.message.hash),
            to_document(message)?,
        )?;
        Ok(())
    }

    /// Drops the temporary copy of `hash`.
    pub fn remove_temporary(&self, hash: &str) -> Result<usize, StoreError> {
        self.store.delete(TEMPORARY_MESSAGES, &by_hash(hash))
    }

    /// Deletes temporary messages received before `cutoff`.
    pub fn purge_temporary(&self, cutoff: TimestampMs) -> Result<usize, StoreError> {
        self.store
            .delete(TEMPORARY_MESSAGES, &Filter::all().lt("receivedAt", cutoff))
    }

    // --- registry ---

    /// The registry row for `name`.
    pub fn registry_row(&self, name: &str) -> Result<Option<AppSpecification>, StoreError> {
        self.find_one_typed(REGISTRY, &by_name(name))
    }

    /// Every registry row, by name.
    pub fn registry_rows(&self) -> Result<Vec<AppSpecification>, StoreError> {
        self.find_typed(REGISTRY, &Filter::all(), &FindOptions::ascending("name"))
    }

    /// Writes the registry row for `spec.name`.
    pub fn upsert_registry(&self, spec: &AppSpecification) -> Result<(), StoreError> {
        self.store
            .upsert(REGISTRY, &by_name(&spec.name), to_document(spec)?)?;
        Ok(())
    }

    /// Deletes the registry row for `name`.
    pub fn delete_registry(&self, name: &str) -> Result<usize, StoreError> {
        self.store.delete(REGISTRY, &by_name(name))
    }

    /// Deletes registry rows projected at or above `from_height`.
    pub fn delete_registry_from(&self, from_height: Height) -> Result<usize, StoreError> {
        self.store
            .delete(REGISTRY, &Filter::all().gte("height", from_height))
    }

    /// Removes every registry row.
    pub fn drop_registry(&self) -> Result<(), StoreError> {
        self.store.drop_collection(REGISTRY)
    }

    /// Number of registry rows.
    pub fn registry_count(&self) -> Result<usize, StoreError> {
        self.store.count(REGISTRY, &Filter::all())
    }

    // --- locations ---

    /// The running claim of `ip` for `name`.
    pub fn location(&self, name: &str, ip: &str) -> Result<Option<LocationRecord>, StoreError> {
        self.find_one_typed(LOCATIONS, &by_name_ip(name, ip))
    }

    /// Live running claims, optionally for one app, longest running first.
    pub fn locations(
        &self,
        name: Option<&str>,
        now: TimestampMs,
    ) -> Result<Vec<LocationRecord>, StoreError> {
        let mut filter = Filter::all().gte("expireAt", now);
        if let Some(name) = name {
            filter = filter.eq("name", name);
        }
        let options = FindOptions::ascending("runningSince")
            .then("broadcastedAt", SortOrder::Ascending)
            .then("ip", SortOrder::Ascending);
        self.find_typed(LOCATIONS, &filter, &options)
    }

    /// Writes the claim of `record.ip` for `record.name`.
    pub fn upsert_location(&self, record: &LocationRecord) -> Result<(), StoreError> {
        self.store.upsert(
            LOCATIONS,
            &by_name_ip(&record.name, &record.ip),
            to_document(record)?,
        )?;
        Ok(())
    }

    /// Deletes the claim of `ip` for `name`.
    pub fn delete_location(&self, name: &str, ip: &str) -> Result<usize, StoreError> {
        self.store.delete(LOCATIONS, &by_name_ip(name, ip))
    }

    // --- installing announcements ---

    /// Live announcements for `name`.
    pub fn installing(
        &self,
        name: &str,
        now: TimestampMs,
    ) -> Result<Vec<InstallingAnnouncement>, StoreError> {
        let filter = by_name(name).gte("expireAt", now);
        let options =
            FindOptions::ascending("broadcastedAt").then("ip", SortOrder::Ascending);
        self.find_typed(INSTALLING, &filter, &options)
    }

    /// Writes the announcement of `a.ip` for `a.name`.
    pub fn upsert_installing(&self, a: &InstallingAnnouncement) -> Result<(), StoreError> {
        self.store
            .upsert(INSTALLING, &by_name_ip(&a.name, &a.ip), to_document(a)?)?;
        Ok(())
    }

    /// Deletes the announcement of `ip` for `name`.
    pub fn delete_installing(&self, name: &str, ip: &str) -> Result<usize, StoreError> {
        self.store.delete(INSTALLING, &by_name_ip(name, ip))
    }

    // --- install errors ---

    /// Live install failures for `name`.
    pub fn install_errors(
        &self,
        name: &str,
        now: TimestampMs,
    ) -> Result<Vec<InstallErrorRecord>, StoreError> {
        self.find_typed(
            INSTALL_ERRORS,
            &by_name(name).gte("expireAt", now),
            &FindOptions::ascending("broadcastedAt"),
        )
    }

    /// Writes the failure of `e.ip` for `e.name`.
    pub fn upsert_install_error(&self, e: &InstallErrorRecord) -> Result<(), StoreError> {
        self.store
            .upsert(INSTALL_ERRORS, &by_name_ip(&e.name, &e.ip), to_document(e)?)?;
        Ok(())
    }

    /// Clears every failure recorded for `name`.
    pub fn clear_install_errors(&self, name: &str) -> Result<usize, StoreError> {
        self.store.delete(INSTALL_ERRORS, &by_name(name))
    }

    /// Deletes expired rows of the location, installing and error collections.
    pub fn purge_expired(&self, now: TimestampMs) -> Result<usize, StoreError> {
        let stale = Filter::all().lt("expireAt", now);
        let mut removed = 0;
        for collection in [LOCATIONS, INSTALLING, INSTALL_ERRORS] {
            removed += self.store.delete(collection, &stale)?;
        }
        Ok(removed)
    }
}
