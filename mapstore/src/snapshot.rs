//! Snapshot persistence for the in-memory store, so a deployment can come
//! back up with its url map graph intact even without an external database.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entities::{ContentMap, Site, UrlMap};

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Full state of a store, in stable id order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub sites: Vec<Site>,
    pub content_maps: Vec<ContentMap>,
    pub url_maps: Vec<UrlMap>,
}

pub trait SnapshotProvider: Send + Sync {
    fn load(&self) -> Result<StoreSnapshot, SnapshotError>;
    fn store(&self, snapshot: &StoreSnapshot) -> Result<(), SnapshotError>;
}

#[derive(Clone)]
enum Compression {
    #[allow(dead_code)]
    None,
    // zstd with compression level
    Zstd(i32),
}

struct Codec {
    compression: Compression,
}

impl Codec {
    fn new(compression: Compression) -> Self {
        Codec { compression }
    }

    // JSON rather than a binary codec: content map options are arbitrary
    // JSON values, which a non-self-describing format cannot round-trip.
    fn write<W: Write>(&self, writer: &mut W, snapshot: &StoreSnapshot) -> Result<(), SnapshotError> {
        match self.compression {
            Compression::None => {
                serde_json::to_writer(&mut *writer, snapshot)?;
                writer.flush()?;
                Ok(())
            }
            Compression::Zstd(level) => {
                let mut encoder = zstd::stream::write::Encoder::new(writer, level)?;
                serde_json::to_writer(&mut encoder, snapshot)?;
                encoder.finish()?;
                Ok(())
            }
        }
    }

    fn read<R: Read>(&self, reader: R) -> Result<StoreSnapshot, SnapshotError> {
        match self.compression {
            Compression::None => Ok(serde_json::from_reader(reader)?),
            Compression::Zstd(_) => {
                let decoder = zstd::stream::read::Decoder::new(reader)?;
                Ok(serde_json::from_reader(decoder)?)
            }
        }
    }
}

// No-op snapshot provider for testing
pub struct NoopSnapshotProvider {}

impl SnapshotProvider for NoopSnapshotProvider {
    fn load(&self) -> Result<StoreSnapshot, SnapshotError> {
        tracing::warn!("loading from the no-op snapshot provider; the store starts empty");
        Ok(StoreSnapshot::default())
    }

    fn store(&self, _snapshot: &StoreSnapshot) -> Result<(), SnapshotError> {
        Ok(())
    }
}

pub struct FilesystemSnapshotProvider {
    path: PathBuf,
    codec: Codec,
}

impl FilesystemSnapshotProvider {
    pub fn new(base_dir: &str, filename: &str) -> Self {
        FilesystemSnapshotProvider {
            path: Path::new(base_dir).join(filename),
            codec: Codec::new(Compression::Zstd(1)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotProvider for FilesystemSnapshotProvider {
    fn load(&self) -> Result<StoreSnapshot, SnapshotError> {
        let file = File::open(&self.path)?;
        self.codec.read(io::BufReader::new(file))
    }

    fn store(&self, snapshot: &StoreSnapshot) -> Result<(), SnapshotError> {
        let file = File::create(&self.path)?;
        let mut writer = io::BufWriter::new(file);
        self.codec.write(&mut writer, snapshot)
    }
}
