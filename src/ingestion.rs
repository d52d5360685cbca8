use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    csv_source::CsvRecords,
    error::Result,
    record::Record,
    record_store::RecordStore,
    walker::{self, SourceFile},
};

/// Records buffered per [`RecordStore::save`] call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// As-of date of the snapshot being imported, shared by every batch.
    pub snapshot_date: NaiveDate,
}

impl IngestOptions {
    pub fn new(snapshot_date: NaiveDate) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            snapshot_date,
        }
    }
}

/// Counters for one ingested source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub read: usize,
    pub saved: usize,
    pub superseded: usize,
    pub batches: usize,
}

/// Outcome of importing one file. Failures do not affect other files.
#[derive(Debug)]
pub struct FileReport {
    pub file: SourceFile,
    pub outcome: Result<IngestStats>,
}

/// Buffer `records` into batches and save each one.
///
/// Superseded revisions are dropped before batching. The first error, from
/// the source or from a save, stops the run; batches saved before it stay
/// durable. A source with nothing to save still records its snapshot date.
pub fn ingest_records<I>(
    store: &RecordStore,
    records: I,
    options: &IngestOptions,
) -> Result<IngestStats>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let batch_size = options.batch_size.max(1);
    let mut stats = IngestStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    for record in records {
        let record = record?;
        stats.read += 1;
        if !record.is_latest {
            stats.superseded += 1;
            continue;
        }
        batch.push(record);
        if batch.len() == batch_size {
            flush(store, &mut batch, options, &mut stats)?;
        }
    }

    if !batch.is_empty() || stats.batches == 0 {
        flush(store, &mut batch, options, &mut stats)?;
    }

    Ok(stats)
}

fn flush(
    store: &RecordStore,
    batch: &mut Vec<Record>,
    options: &IngestOptions,
    stats: &mut IngestStats,
) -> Result<()> {
    let receipt = store.save(batch, options.snapshot_date)?;
    stats.saved += batch.len();
    stats.batches += 1;
    debug!(
        batch = stats.batches,
        size = batch.len(),
        version = receipt.version,
        "flushed batch"
    );
    batch.clear();
    Ok(())
}

/// Import a single CSV file.
pub fn ingest_file(
    store: &RecordStore,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestStats> {
    ingest_records(store, CsvRecords::open(path)?, options)
}

/// Import several CSV files concurrently, one report per file in input
/// order. Batches from different files interleave freely; name index merges
/// are unions, so the order does not matter.
pub fn ingest_files(
    store: &RecordStore,
    files: &[SourceFile],
    options: &IngestOptions,
) -> Vec<FileReport> {
    files
        .par_iter()
        .map(|file| {
            let outcome = ingest_file(store, &file.absolute_path, options);
            match &outcome {
                Ok(stats) => info!(
                    file = %file.relative_path.display(),
                    read = stats.read,
                    saved = stats.saved,
                    superseded = stats.superseded,
                    "imported file"
                ),
                Err(e) => warn!(
                    file = %file.relative_path.display(),
                    error = %e,
                    "import failed"
                ),
            }
            FileReport {
                file: file.clone(),
                outcome,
            }
        })
        .collect()
}

/// Import a CSV file, or every CSV file under a directory.
pub fn ingest_path(
    store: &RecordStore,
    path: &Path,
    options: &IngestOptions,
) -> Result<Vec<FileReport>> {
    let files = if path.is_dir() {
        walker::discover_csv_files(path)?
    } else {
        let absolute_path = path.canonicalize()?;
        vec![SourceFile {
            relative_path: path
                .file_name()
                .map(Into::into)
                .unwrap_or_else(|| path.to_path_buf()),
            size: std::fs::metadata(&absolute_path)?.len(),
            absolute_path,
        }]
    };
    info!(files = files.len(), root = %path.display(), "importing");

    Ok(ingest_files(store, &files, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        record::fixtures::{date, record},
    };

    const ROW: &str = "1,T1000000000001,01,0,2,1,1,2023-10-01,,,,北海道苫小牧市旭町４丁目５－６,01,213,,,,,苫小牧市,,,,,";

    fn test_store() -> (tempfile::TempDir, RecordStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(&tmp.path().join("registry.redb")).unwrap();
        (tmp, store)
    }

    fn options(batch_size: usize) -> IngestOptions {
        IngestOptions {
            batch_size,
            snapshot_date: date("2023-10-01"),
        }
    }

    #[test]
    fn batches_and_filters_superseded() {
        let (_tmp, store) = test_store();
        let records = (1..=7).map(|i| {
            let mut r = record(&format!("T{i:013}"), "同名商店");
            r.is_latest = i % 3 != 0;
            Ok(r)
        });

        let stats = ingest_records(&store, records, &options(2)).unwrap();
        assert_eq!(
            stats,
            IngestStats {
                read: 7,
                saved: 5,
                superseded: 2,
                batches: 3,
            }
        );
        assert_eq!(store.count().unwrap(), 5);
        assert!(store.find(&["T0000000000003"]).unwrap().is_empty());
    }

    #[test]
    fn empty_source_still_records_snapshot() {
        let (_tmp, store) = test_store();
        let stats =
            ingest_records(&store, std::iter::empty(), &options(10)).unwrap();

        assert_eq!(stats.batches, 1);
        assert_eq!(store.last_update_date().unwrap(), Some(date("2023-10-01")));
    }

    #[test]
    fn source_error_stops_after_saved_batches() {
        let (_tmp, store) = test_store();
        let records = (1..=5).map(|i| {
            if i == 4 {
                Err(Error::Validation {
                    line: 4,
                    field: "id",
                    reason: "bad".to_string(),
                })
            } else {
                Ok(record(&format!("T{i:013}"), "同名商店"))
            }
        });

        let err = ingest_records(&store, records, &options(2)).unwrap_err();
        assert!(matches!(err, Error::Validation { line: 4, .. }));

        // The first full batch was committed, the pending third record was not.
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn files_are_independent() {
        let (tmp, store) = test_store();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("good.csv"), format!("{ROW}\n")).unwrap();
        std::fs::write(src.join("bad.csv"), "1,not-an-id\n").unwrap();

        let reports = ingest_path(&store, &src, &options(10)).unwrap();
        assert_eq!(reports.len(), 2);

        let bad = &reports[0];
        assert_eq!(bad.file.relative_path.to_string_lossy(), "bad.csv");
        assert!(bad.outcome.is_err());

        let good = reports[1].outcome.as_ref().unwrap();
        assert_eq!(good.saved, 1);
        assert_eq!(store.find_exact_by_name("苫小牧市").unwrap().len(), 1);
    }

    #[test]
    fn single_file_path() {
        let (tmp, store) = test_store();
        let file = tmp.path().join("one.csv");
        std::fs::write(&file, format!("{ROW}\n")).unwrap();

        let reports = ingest_path(&store, &file, &options(10)).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].file.relative_path.to_string_lossy(), "one.csv");
        assert_eq!(store.count().unwrap(), 1);
    }
}
