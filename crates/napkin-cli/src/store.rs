//! Writes received images into the output directory.
//!
//! Files are named `<prefix>-<YYYY-MM-DD-HH-MM-SS>.<ext>`. When two images
//! land in the same second the later ones get `-1`, `-2`, ... suffixes.
//! Existing files are never overwritten.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Extension used when the client's file name has none we can trust.
const DEFAULT_EXTENSION: &str = "jpg";

/// Give up after this many same-second collisions.
const MAX_SUFFIX: u32 = 10_000;

/// Destination for received images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    prefix: String,
}

impl ImageStore {
    /// Create a store writing into `dir` with the given file prefix.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base file name (without collision suffix) for an upload received at `at`.
    pub fn base_name<Tz: TimeZone>(&self, original: &str, at: &DateTime<Tz>) -> (String, String)
    where
        Tz::Offset: std::fmt::Display,
    {
        let stem = format!("{}-{}", self.prefix, at.format("%Y-%m-%d-%H-%M-%S"));
        (stem, extension_of(original))
    }

    /// Write `bytes` to a fresh file and return its path.
    pub async fn save<Tz: TimeZone>(
        &self,
        original: &str,
        bytes: &[u8],
        at: &DateTime<Tz>,
    ) -> io::Result<PathBuf>
    where
        Tz::Offset: std::fmt::Display,
    {
        let (stem, ext) = self.base_name(original, at);

        for n in 0..MAX_SUFFIX {
            let name = if n == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}-{n}.{ext}")
            };
            let path = self.dir.join(name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.sync_all().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("too many files named {stem}.{ext}"),
        ))
    }
}

/// Lowercased alphanumeric extension of `filename`, or the default.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| DEFAULT_EXTENSION.to_string(), str::to_ascii_lowercase)
}
