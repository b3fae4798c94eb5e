//! Backup: gzipped tar archive of the store's base directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::time::now_millis;

/// Archive `base_dir` into `<output_dir>/<stem>-<epoch_ms>.tar.gz` and
/// return the archive path. Entries are rooted under the base directory's
/// name so the archive unpacks into a single folder.
pub(crate) fn create_archive(base_dir: &Path, output_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let stem = base_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let archive_path = output_dir.join(format!("{}-{}.tar.gz", stem, now_millis()));

    let file = File::create(&archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(&stem, base_dir)?;
    let encoder = builder.into_inner()?;
    encoder.finish()?;

    Ok(archive_path)
}
