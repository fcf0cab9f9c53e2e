use crate::error::Result;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate every regular file directly inside `dir` into `archive_path`.
///
/// Entries are named `<dir name>/<file name>` and added in name order.
/// The archive itself is never an entry, even when it lives inside `dir`.
/// Returns the number of files archived.
pub fn zip_dir(dir: &Path, archive_path: &Path) -> Result<usize> {
    let prefix = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let archive_abs = std::fs::canonicalize(archive_path)?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && std::fs::canonicalize(&path)? != archive_abs {
            files.push(path);
        }
    }
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        debug!(entry = %entry, "archiving");
        zip.start_file(entry, options)?;
        io::copy(&mut File::open(path)?, &mut zip)?;
    }
    zip.finish()?;

    info!(archive = %archive_path.display(), files = files.len(), "archive written");
    Ok(files.len())
}
