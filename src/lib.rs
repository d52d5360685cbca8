//! invoice-registry - a local store for bulk snapshots of the qualified
//! invoice issuer registry.
//!
//! Snapshot CSV files are validated into [`Record`]s, saved in chunked atomic
//! commits into a [redb](https://github.com/cberner/redb) file, and indexed
//! by name. Names are matched after widening half-width alphanumerics, the
//! convention the registry itself uses.
//!
//! # Quick start
//!
//! ```no_run
//! use invoice_registry::{DataDir, RecordStore};
//! use invoice_registry::ingestion::{self, IngestOptions};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let store = RecordStore::open(&data_dir.store_db()).unwrap();
//!
//! let snapshot = chrono::NaiveDate::from_ymd_opt(2023, 10, 1).unwrap();
//! ingestion::ingest_path(
//!     &store,
//!     std::path::Path::new("downloads/"),
//!     &IngestOptions::new(snapshot),
//! )
//! .unwrap();
//!
//! for r in store.search_by_name("ABC").unwrap() {
//!     println!("{}\t{}", r.id, r.name);
//! }
//! println!("{} records", store.count().unwrap());
//! ```

pub mod chunked_writer;
pub mod csv_source;
pub mod data_dir;
pub mod error;
pub mod ingestion;
pub mod normalize;
pub mod record;
pub mod record_store;
pub mod walker;

pub use chunked_writer::{ChunkedWriter, CommitTarget, Mutation, WriteReceipt};
pub use data_dir::{DataDir, DataDirSource};
pub use error::{Error, Result};
pub use record::Record;
pub use record_store::{RecordStore, StoreOptions};
