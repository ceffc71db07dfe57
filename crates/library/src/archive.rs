use std::fs;
use std::path::{Path, PathBuf};

use common::SongRecord;
use parking_lot::Mutex;
use redb::{
    Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::LibraryError;

pub const ARCHIVE_VERSION: u32 = 1;

const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const SONGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("songs");

const META_VERSION_KEY: &str = "version";

/// Durable copy of the ordered song list. Only identity and display fields
/// are stored.
#[derive(Debug)]
pub struct ArchiveStore {
    path: PathBuf,
    // One open handle per file at a time.
    lock: Mutex<()>,
}

impl ArchiveStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the archived list with `records` in a single transaction.
    pub fn save(&self, records: &[SongRecord]) -> Result<(), LibraryError> {
        let _guard = self.lock.lock();
        let db = open_for_write(&self.path)?;
        let write_txn = db.begin_write()?;
        {
            clear_songs(&write_txn)?;
            let mut songs_table = write_txn.open_table(SONGS_TABLE)?;
            for (ordinal, record) in records.iter().enumerate() {
                let bytes = encode_value(record)?;
                songs_table.insert(ordinal as u64, bytes.as_slice())?;
            }

            let mut meta_table = write_txn.open_table(META_TABLE)?;
            let version_bytes = encode_value(&ARCHIVE_VERSION)?;
            meta_table.insert(META_VERSION_KEY, version_bytes.as_slice())?;
        }
        write_txn.commit()?;
        debug!("Saved {} songs to {:?}", records.len(), self.path);
        Ok(())
    }

    /// Returns the archived list, or `None` when there is no usable archive.
    pub fn load(&self) -> Option<Vec<SongRecord>> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            info!("No archive at {:?}", self.path);
            return None;
        }
        match read_records(&self.path) {
            Ok(Some(records)) => {
                info!("Loaded {} songs from {:?}", records.len(), self.path);
                Some(records)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("Archive at {:?} is unreadable: {}", self.path, err);
                None
            }
        }
    }
}

fn open_for_write(path: &Path) -> Result<Database, LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    match Database::create(path) {
        Ok(db) => Ok(db),
        Err(err) if is_unreadable_archive(&err) => {
            warn!("Replacing unreadable archive at {:?}: {}", path, err);
            fs::remove_file(path)?;
            Ok(Database::create(path)?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Only a file that is not a usable archive may be discarded. I/O failures
/// leave the existing archive in place.
fn is_unreadable_archive(err: &DatabaseError) -> bool {
    matches!(
        err,
        DatabaseError::Storage(StorageError::Corrupted(_)) | DatabaseError::UpgradeRequired(_)
    )
}

fn read_records(path: &Path) -> Result<Option<Vec<SongRecord>>, LibraryError> {
    let db = Database::open(path)?;
    let read_txn = db.begin_read()?;

    let meta_table = match read_txn.open_table(META_TABLE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let version: Option<u32> = match meta_table.get(META_VERSION_KEY)? {
        Some(value) => Some(decode_value(value.value())?),
        None => None,
    };
    match version {
        Some(version) if version == ARCHIVE_VERSION => {}
        Some(version) => {
            warn!("Archive version mismatch ({}); ignoring", version);
            return Ok(None);
        }
        None => return Ok(None),
    }

    let songs_table = match read_txn.open_table(SONGS_TABLE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(Some(Vec::new())),
        Err(err) => return Err(err.into()),
    };
    let mut records = Vec::new();
    for entry in songs_table.iter()? {
        let entry = entry?;
        let record: SongRecord = decode_value(entry.1.value())?;
        records.push(record);
    }
    Ok(Some(records))
}

fn clear_songs(txn: &WriteTransaction) -> Result<(), LibraryError> {
    match txn.delete_table(SONGS_TABLE) {
        Ok(_) => Ok(()),
        Err(TableError::TableDoesNotExist(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, LibraryError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, LibraryError> {
    Ok(bincode::deserialize(bytes)?)
}
