use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::IngestError;

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), IngestError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| IngestError::Archive(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| IngestError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| IngestError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(IngestError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| IngestError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

/// Decompress a `.gz` file next to itself, dropping the suffix. Returns the
/// decompressed path.
pub fn gunzip_file(gz_path: &Path) -> Result<PathBuf, IngestError> {
    let target = gz_path.with_extension("");
    let file = fs::File::open(gz_path)
        .map_err(|err| IngestError::Archive(format!("open gz {}: {err}", gz_path.display())))?;
    let mut decoder = GzDecoder::new(file);
    let mut outfile =
        fs::File::create(&target).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    io::copy(&mut decoder, &mut outfile)
        .map_err(|err| IngestError::Archive(format!("gunzip {}: {err}", gz_path.display())))?;
    fs::remove_file(gz_path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    Ok(target)
}

/// Package a directory into zip bytes. Entries are prefixed with the
/// directory's own name and written in sorted order so archives are stable.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, IngestError> {
    let root_name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::Archive(format!("unnamed directory {}", dir.display())))?;

    let mut writer = ZipWriter::new(io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    for path in files {
        let relative = path
            .strip_prefix(dir)
            .map_err(|err| IngestError::Archive(err.to_string()))?;
        let entry_name = Path::new(root_name).join(relative);
        let entry_name = entry_name
            .to_str()
            .ok_or_else(|| IngestError::Archive("non-utf8 archive entry name".to_string()))?;
        writer
            .start_file(entry_name, options)
            .map_err(|err| IngestError::Archive(err.to_string()))?;
        let content = fs::read(&path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        writer
            .write_all(&content)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|err| IngestError::Archive(err.to_string()))?;
    Ok(cursor.into_inner())
}

fn collect_files(root: &Path, out: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let entries = fs::read_dir(root).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Immediate sub-directories of a directory, sorted by name.
pub fn sub_directories(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(dir).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
