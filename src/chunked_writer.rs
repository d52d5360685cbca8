use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Default number of mutations committed per atomic group.
pub const DEFAULT_COMMIT_LIMIT: usize = 500;

/// Logical key namespace a plain set/delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Records,
    NameIndex,
    Meta,
}

/// One keyed change applied inside a commit group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set {
        ns: Namespace,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        ns: Namespace,
        key: String,
    },
    /// Union `ids` into the name index entry for `name`. The current entry
    /// is read and rewritten inside the same commit.
    UnionIds { name: String, ids: BTreeSet<String> },
    /// Drop `id` from the entry for `name`, removing the entry once empty.
    RemoveId { name: String, id: String },
    /// Raise the last-update marker to at least the given date.
    AdvanceDate(NaiveDate),
}

/// Storage that can apply a group of mutations as one atomic commit.
pub trait CommitTarget {
    /// Commit `group` atomically and return the version token it produced.
    fn commit_group(&self, group: &[Mutation]) -> Result<u64>;
}

/// Outcome of a successful multi-group write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    /// Version token of the last committed group, or 0 if nothing was written.
    pub version: u64,
    pub groups: usize,
    pub mutations: usize,
}

/// Splits a logical batch into commit groups of at most `limit` mutations.
///
/// Each group is atomic on its own. When a group is rejected the write stops
/// there: earlier groups stay committed, later ones are never attempted.
/// Callers retry the whole logical batch; record upserts and index unions
/// are idempotent, so re-applying an already committed prefix is harmless.
pub struct ChunkedWriter<'a, T: CommitTarget + ?Sized> {
    target: &'a T,
    limit: usize,
}

impl<'a, T: CommitTarget + ?Sized> ChunkedWriter<'a, T> {
    pub fn new(target: &'a T, limit: usize) -> Self {
        Self {
            target,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn write(&self, mutations: &[Mutation]) -> Result<WriteReceipt> {
        let mut receipt = WriteReceipt::default();

        for (group, chunk) in mutations.chunks(self.limit).enumerate() {
            let version = self.target.commit_group(chunk).map_err(|e| {
                Error::WriteFailure {
                    group,
                    reason: e.to_string(),
                }
            })?;
            debug!(group, size = chunk.len(), version, "committed group");

            receipt.version = version;
            receipt.groups += 1;
            receipt.mutations += chunk.len();
        }

        Ok(receipt)
    }
}
