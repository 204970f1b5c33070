use std::{
    fs::File,
    io::{ErrorKind, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use tracing::debug;

/// Durable string storage addressed by key. Missing keys are a normal outcome.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores every key in its own file inside one directory. Writers replace the file through a
/// temporary file and a rename, so readers never observe a half written value. A lock file
/// serializes access between processes.
pub struct FileStore {
    dir: PathBuf,
}

const LOCK_FILE: &str = ".lock";

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_file(&self) -> Result<File> {
        File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))
            .context("Failed to open storage lock")
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let lock = self.lock_file()?;
        FileExt::lock_shared(&lock)?;
        let result = std::fs::read_to_string(self.path_for(key));
        FileExt::unlock(&lock)?;

        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read key {key}")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let temporary = self.dir.join(format!("{key}.json.tmp"));

        let lock = self.lock_file()?;
        FileExt::lock_exclusive(&lock)?;
        let result = (|| -> Result<()> {
            let mut file = File::create(&temporary)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&temporary, &path)?;
            Ok(())
        })();
        FileExt::unlock(&lock)?;

        debug!("Stored {} bytes under {key}", value.len());
        result.with_context(|| format!("Failed to write key {key}"))
    }
}
