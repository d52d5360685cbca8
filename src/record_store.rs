use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use chrono::NaiveDate;
use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    TableDefinition,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    chunked_writer::{
        ChunkedWriter,
        CommitTarget,
        DEFAULT_COMMIT_LIMIT,
        Mutation,
        Namespace,
        WriteReceipt,
    },
    error::Result,
    normalize,
    record::Record,
};

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
const NAME_INDEX: TableDefinition<&str, &[u8]> =
    TableDefinition::new("name_index");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const LAST_UPDATE_KEY: &str = "last_update_date";
const COUNT_CACHE_KEY: &str = "count_cache";
const VERSION_KEY: &str = "commit_version";

/// Default number of ids looked up per read transaction in [`RecordStore::find`].
pub const DEFAULT_READ_BATCH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Maximum mutations per atomic commit group.
    pub commit_limit: usize,
    /// Ids resolved per read transaction.
    pub read_batch: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            commit_limit: DEFAULT_COMMIT_LIMIT,
            read_batch: DEFAULT_READ_BATCH,
        }
    }
}

/// Cached record count, valid only for the marker and version it was
/// computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountCache {
    snapshot_date: Option<NaiveDate>,
    version: u64,
    count: u64,
}

/// Durable registry store with a name index and a cached record count.
///
/// Three namespaces live in one redb file (by default
/// [`STORE_FILE_NAME`](crate::data_dir::STORE_FILE_NAME) under the data
/// directory): `records` (id to record), `name_index` (widened name to the
/// ids bearing it) and `meta` (last-update
/// marker, count cache, commit version). All writes go through a
/// [`ChunkedWriter`]; misses are never errors.
pub struct RecordStore {
    db: Database,
    options: StoreOptions,
}

impl RecordStore {
    /// Open or create a store at `path` with default options.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use invoice_registry::RecordStore;
    ///
    /// let store = RecordStore::open(&tmp.path().join("registry.redb")).unwrap();
    /// assert_eq!(store.count().unwrap(), 0);
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(NAME_INDEX)?;
        txn.open_table(META)?;
        txn.commit()?;

        let options = StoreOptions {
            commit_limit: options.commit_limit.max(1),
            read_batch: options.read_batch.max(1),
        };
        Ok(Self { db, options })
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    fn writer<'a, T: CommitTarget + ?Sized>(
        &self,
        target: &'a T,
    ) -> ChunkedWriter<'a, T> {
        ChunkedWriter::new(target, self.options.commit_limit)
    }

    // -- Writes --

    /// Upsert the latest revisions in `records` and merge their widened
    /// names into the name index, then advance the last-update marker to `snapshot_date`
    /// if it is newer.
    ///
    /// Superseded revisions (`is_latest == false`) are skipped and never
    /// overwrite the stored value for their id.
    pub fn save(
        &self,
        records: &[Record],
        snapshot_date: NaiveDate,
    ) -> Result<WriteReceipt> {
        self.save_via(&self.db, records, snapshot_date)
    }

    fn save_via<T: CommitTarget + ?Sized>(
        &self,
        target: &T,
        records: &[Record],
        snapshot_date: NaiveDate,
    ) -> Result<WriteReceipt> {
        let mut mutations = Vec::with_capacity(records.len() + 1);
        let mut names: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut superseded = 0usize;

        for record in records {
            if !record.is_latest {
                superseded += 1;
                continue;
            }
            mutations.push(Mutation::Set {
                ns: Namespace::Records,
                key: record.id.clone(),
                value: serde_json::to_vec(record)?,
            });
            names
                .entry(normalize::to_wide(&record.name))
                .or_default()
                .insert(record.id.clone());
        }

        for (name, ids) in names {
            // An empty name carries nothing worth indexing.
            if name.is_empty() {
                continue;
            }
            mutations.push(Mutation::UnionIds { name, ids });
        }

        mutations.push(Mutation::AdvanceDate(snapshot_date));

        let receipt = self.writer(target).write(&mutations)?;
        debug!(
            records = records.len() - superseded,
            superseded,
            groups = receipt.groups,
            version = receipt.version,
            "saved batch"
        );
        Ok(receipt)
    }

    /// Remove one record and drop its id from the name index.
    ///
    /// Returns `None` without writing when the id is absent.
    pub fn delete(&self, id: &str) -> Result<Option<WriteReceipt>> {
        let Some(record) = self.get(id)? else {
            return Ok(None);
        };

        let mut mutations = vec![Mutation::Delete {
            ns: Namespace::Records,
            key: record.id.clone(),
        }];
        if !record.name.is_empty() {
            mutations.push(Mutation::RemoveId {
                name: normalize::to_wide(&record.name),
                id: record.id,
            });
        }

        Ok(Some(self.writer(&self.db).write(&mutations)?))
    }

    /// Delete every record, every name index entry, the count cache and the
    /// last-update marker. Safe to call on an empty store.
    pub fn reset(&self) -> Result<WriteReceipt> {
        self.reset_via(&self.db)
    }

    fn reset_via<T: CommitTarget + ?Sized>(
        &self,
        target: &T,
    ) -> Result<WriteReceipt> {
        let mut mutations = Vec::new();
        {
            let txn = self.db.begin_read()?;
            for (ns, def) in
                [(Namespace::Records, RECORDS), (Namespace::NameIndex, NAME_INDEX)]
            {
                let table = txn.open_table(def)?;
                for entry in table.iter()? {
                    let (k, _) = entry?;
                    mutations.push(Mutation::Delete {
                        ns,
                        key: k.value().to_string(),
                    });
                }
            }
        }
        for key in [COUNT_CACHE_KEY, LAST_UPDATE_KEY] {
            mutations.push(Mutation::Delete {
                ns: Namespace::Meta,
                key: key.to_string(),
            });
        }

        let receipt = self.writer(target).write(&mutations)?;
        debug!(deleted = mutations.len(), groups = receipt.groups, "reset store");
        Ok(receipt)
    }

    // -- Reads --

    pub fn get(&self, id: &str) -> Result<Option<Record>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Look up records by id, dropping misses. Results are ordered by
    /// ascending id and contain each id at most once.
    pub fn find<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Record>> {
        let mut results = Vec::with_capacity(ids.len());

        for batch in ids.chunks(self.options.read_batch) {
            let txn = self.db.begin_read()?;
            let table = txn.open_table(RECORDS)?;
            for id in batch {
                if let Some(guard) = table.get(id.as_ref())? {
                    results.push(serde_json::from_slice::<Record>(
                        guard.value(),
                    )?);
                }
            }
        }

        results.sort_by(|a, b| a.id.cmp(&b.id));
        results.dedup_by(|a, b| a.id == b.id);
        Ok(results)
    }

    /// Records whose name equals `name` after half-width alphanumerics are
    /// widened.
    pub fn find_exact_by_name(&self, name: &str) -> Result<Vec<Record>> {
        let key = normalize::to_wide(name);
        if key.is_empty() {
            return Ok(Vec::new());
        }

        let ids = {
            let txn = self.db.begin_read()?;
            let table = txn.open_table(NAME_INDEX)?;
            let Some(guard) = table.get(key.as_str())? else {
                return Ok(Vec::new());
            };
            decode_ids(guard.value())?
        };

        self.find(&ids.into_iter().collect::<Vec<_>>())
    }

    /// Records whose indexed name contains `fragment` after normalization.
    ///
    /// Scans the whole name index; the name universe is small enough that a
    /// flat scan beats maintaining an n-gram index.
    pub fn search_by_name(&self, fragment: &str) -> Result<Vec<Record>> {
        let needle = normalize::to_wide(fragment);
        let mut ids = BTreeSet::new();
        {
            let txn = self.db.begin_read()?;
            let table = txn.open_table(NAME_INDEX)?;
            for entry in table.iter()? {
                let (name, value) = entry?;
                if name.value().contains(needle.as_str()) {
                    ids.extend(decode_ids(value.value())?);
                }
            }
        }

        self.find(&ids.into_iter().collect::<Vec<_>>())
    }

    /// Number of stored records.
    ///
    /// Served from the count cache while it matches the current last-update
    /// marker and commit version; otherwise recounted by full scan and the
    /// cache rewritten.
    pub fn count(&self) -> Result<u64> {
        let fresh = {
            let txn = self.db.begin_read()?;
            let meta = txn.open_table(META)?;
            let marker: Option<NaiveDate> = read_meta(&meta, LAST_UPDATE_KEY)?;
            let version: u64 = read_meta(&meta, VERSION_KEY)?.unwrap_or(0);
            let cached: Option<CountCache> = read_meta(&meta, COUNT_CACHE_KEY)?;

            if let Some(cache) = cached
                && cache.snapshot_date == marker
                && cache.version == version
            {
                return Ok(cache.count);
            }

            let records = txn.open_table(RECORDS)?;
            let mut count = 0u64;
            for entry in records.iter()? {
                entry?;
                count += 1;
            }
            CountCache {
                snapshot_date: marker,
                version,
                count,
            }
        };

        if let Err(e) = self.write_count_cache(&fresh) {
            warn!(error = %e, "failed to rewrite count cache");
        }
        Ok(fresh.count)
    }

    fn write_count_cache(&self, cache: &CountCache) -> Result<()> {
        let value = serde_json::to_vec(cache)?;
        let txn = self.db.begin_write()?;
        {
            let mut meta = txn.open_table(META)?;
            meta.insert(COUNT_CACHE_KEY, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Most recent snapshot date accepted by any completed save.
    pub fn last_update_date(&self) -> Result<Option<NaiveDate>> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        read_meta(&meta, LAST_UPDATE_KEY)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// One commit group is one redb write transaction. Name merges and the
/// marker advance read and write inside that transaction, and redb admits a
/// single writer at a time, so concurrent saves cannot lose index updates.
impl CommitTarget for Database {
    fn commit_group(&self, group: &[Mutation]) -> Result<u64> {
        let txn = self.begin_write()?;
        let version = {
            let mut records = txn.open_table(RECORDS)?;
            let mut names = txn.open_table(NAME_INDEX)?;
            let mut meta = txn.open_table(META)?;

            for mutation in group {
                match mutation {
                    Mutation::Set { ns, key, value } => {
                        let table = match ns {
                            Namespace::Records => &mut records,
                            Namespace::NameIndex => &mut names,
                            Namespace::Meta => &mut meta,
                        };
                        table.insert(key.as_str(), value.as_slice())?;
                    }
                    Mutation::Delete { ns, key } => {
                        let table = match ns {
                            Namespace::Records => &mut records,
                            Namespace::NameIndex => &mut names,
                            Namespace::Meta => &mut meta,
                        };
                        table.remove(key.as_str())?;
                    }
                    Mutation::UnionIds { name, ids } => {
                        let mut merged = match names.get(name.as_str())? {
                            Some(guard) => decode_ids(guard.value())?,
                            None => BTreeSet::new(),
                        };
                        merged.extend(ids.iter().cloned());
                        let value = serde_json::to_vec(&merged)?;
                        names.insert(name.as_str(), value.as_slice())?;
                    }
                    Mutation::RemoveId { name, id } => {
                        let mut remaining = match names.get(name.as_str())? {
                            Some(guard) => decode_ids(guard.value())?,
                            None => continue,
                        };
                        remaining.remove(id);
                        if remaining.is_empty() {
                            names.remove(name.as_str())?;
                        } else {
                            let value = serde_json::to_vec(&remaining)?;
                            names.insert(name.as_str(), value.as_slice())?;
                        }
                    }
                    Mutation::AdvanceDate(date) => {
                        let current: Option<NaiveDate> =
                            read_meta(&meta, LAST_UPDATE_KEY)?;
                        if current.is_none_or(|c| c < *date) {
                            let value = serde_json::to_vec(date)?;
                            meta.insert(LAST_UPDATE_KEY, value.as_slice())?;
                        }
                    }
                }
            }

            let next = read_meta::<u64>(&meta, VERSION_KEY)?.unwrap_or(0) + 1;
            let value = serde_json::to_vec(&next)?;
            meta.insert(VERSION_KEY, value.as_slice())?;
            next
        };
        txn.commit()?;
        Ok(version)
    }
}

fn decode_ids(bytes: &[u8]) -> Result<BTreeSet<String>> {
    Ok(serde_json::from_slice(bytes)?)
}

fn read_meta<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Option<T>> {
    match table.get(key)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}
