use std::env;
use std::path::PathBuf;

use library::{sweep_orphans, ArchiveStore, SongIndex};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let documents = args
        .next()
        .or_else(|| env::var("DOCUMENTS_PATH").ok())
        .ok_or("DOCUMENTS_PATH not set and no path argument")?;
    let documents = PathBuf::from(documents);
    let archive_path = args
        .next()
        .or_else(|| env::var("ARCHIVE_PATH").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| documents.join("songs.redb"));

    // Without an archive every numbered file would look orphaned.
    let records = ArchiveStore::new(archive_path.clone())
        .load()
        .ok_or_else(|| format!("no usable archive at {:?}", archive_path))?;
    let index = SongIndex::from_records(records, &documents);

    match sweep_orphans(&documents, &index) {
        Some(report) => {
            println!("{}", report);
            Ok(())
        }
        None => {
            warn!("Could not list {:?}", documents);
            Err(format!("cannot list {:?}", documents).into())
        }
    }
}
