use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "INVOICE_REGISTRY_DATA_DIR";

/// File name of the redb store inside the data directory.
pub const STORE_FILE_NAME: &str = "registry.redb";

/// Where the data directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirSource {
    Flag,
    Env,
    Xdg,
}

impl fmt::Display for DataDirSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flag => "--data-dir",
            Self::Env => DATA_DIR_ENV_VAR,
            Self::Xdg => "xdg",
        })
    }
}

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    source: DataDirSource,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The INVOICE_REGISTRY_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/invoice-registry/)
    ///
    /// A path that exists but is not a directory is rejected rather than
    /// having a store created next to it.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_from(explicit, std::env::var_os(DATA_DIR_ENV_VAR))
    }

    fn resolve_from(
        explicit: Option<&Path>,
        env: Option<OsString>,
    ) -> Result<Self> {
        let (root, source) = match (explicit, env) {
            (Some(path), _) => (path.to_path_buf(), DataDirSource::Flag),
            (None, Some(val)) if !val.is_empty() => {
                (PathBuf::from(val), DataDirSource::Env)
            }
            _ => {
                let home = xdg::BaseDirectories::with_prefix("invoice-registry")
                    .get_data_home()
                    .ok_or_else(|| {
                        Error::Config(
                            "could not determine XDG data home directory"
                                .into(),
                        )
                    })?;
                (home, DataDirSource::Xdg)
            }
        };

        if root.exists() && !root.is_dir() {
            return Err(Error::DataDir(root));
        }
        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root, source })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> DataDirSource {
        self.source
    }

    pub fn store_db(&self) -> PathBuf {
        self.root.join(STORE_FILE_NAME)
    }

    /// Whether a store file has been created here yet.
    pub fn has_store(&self) -> bool {
        self.store_db().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.source(), DataDirSource::Flag);
        assert_eq!(dir.store_db(), tmp.path().join(STORE_FILE_NAME));
        assert!(!dir.has_store());
    }

    #[test]
    fn explicit_path_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(dir.root().is_dir());
    }

    #[test]
    fn explicit_path_wins_over_env() {
        let tmp = tempfile::tempdir().unwrap();
        let flag = tmp.path().join("flag");
        let env = tmp.path().join("env");

        let dir =
            DataDir::resolve_from(Some(&flag), Some(env.clone().into()))
                .unwrap();
        assert_eq!(dir.root(), flag);

        let dir = DataDir::resolve_from(None, Some(env.clone().into())).unwrap();
        assert_eq!(dir.root(), env);
        assert_eq!(dir.source(), DataDirSource::Env);
        assert_eq!(dir.source().to_string(), DATA_DIR_ENV_VAR);
    }

    #[test]
    fn file_in_place_of_directory_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("snapshot.csv");
        std::fs::write(&file, "not a directory").unwrap();

        let err = DataDir::resolve(Some(&file)).unwrap_err();
        assert!(matches!(err, Error::DataDir(path) if path == file));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "not a directory");
    }

    #[test]
    fn has_store_after_open() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        crate::RecordStore::open(&dir.store_db()).unwrap();
        assert!(dir.has_store());
    }
}
