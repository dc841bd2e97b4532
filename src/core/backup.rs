/// Backup archive discovery and extraction
///
/// An archive is a zip holding `dump.sql` at its root and optionally a
/// `filestore/` tree.

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

use crate::utils::{format_timestamp, DUMP_FILE_NAME, FILESTORE_DIR_NAME};

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No dump.sql found in {}", .0.display())]
    MissingDump(PathBuf),

    #[error("Backup directory {} is not readable: {}", .0.display(), .1)]
    UnreadableDir(PathBuf, #[source] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

impl BackupArchive {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// `YYYY-MM-DD HH:MM - name.zip`
    pub fn display_name(&self) -> String {
        format!("{} - {}", format_timestamp(&self.modified), self.file_name())
    }
}

/// Files in `dir` ending in `.<extension>`, newest first
pub fn list_backups(dir: &Path, extension: &str) -> Result<Vec<BackupArchive>, BackupError> {
    let suffix = format!(".{}", extension);
    let entries = fs::read_dir(dir).map_err(|e| BackupError::UnreadableDir(dir.to_path_buf(), e))?;

    let mut archives = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(&suffix) {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        archives.push(BackupArchive {
            path: entry.path(),
            modified: DateTime::<Local>::from(metadata.modified()?),
        });
    }

    archives.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(archives)
}

/// Paths of an extracted archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBackup {
    pub dump: PathBuf,
    pub filestore: Option<PathBuf>,
}

/// Empty `staging`, unpack `archive` into it and locate the dump.
///
/// Clearing first guarantees a dump left over from an earlier run is never
/// mistaken for this archive's.
pub fn extract(archive: &Path, staging: &Path) -> Result<ExtractedBackup, BackupError> {
    if staging.exists() {
        fs::remove_dir_all(staging)?;
    }
    fs::create_dir_all(staging)?;

    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => staging.join(path),
            None => continue,
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    let dump = staging.join(DUMP_FILE_NAME);
    if !dump.is_file() {
        return Err(BackupError::MissingDump(archive.to_path_buf()));
    }

    let filestore = staging.join(FILESTORE_DIR_NAME);
    let filestore = filestore.is_dir().then_some(filestore);

    tracing::info!(
        archive = %archive.display(),
        has_filestore = filestore.is_some(),
        "backup extracted"
    );

    Ok(ExtractedBackup { dump, filestore })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Write a zip with the given (name, contents) entries
    pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::write_zip;
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, age_secs: u64) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs)).unwrap();
    }

    #[test]
    fn test_list_backups_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("old.zip"), 3600);
        touch(&dir.path().join("new.zip"), 10);
        touch(&dir.path().join("middle.zip"), 600);
        touch(&dir.path().join("notes.txt"), 1);
        touch(&dir.path().join("archive.zip.part"), 1);
        fs::create_dir(dir.path().join("folder.zip")).unwrap();

        let names: Vec<String> = list_backups(dir.path(), "zip")
            .unwrap()
            .iter()
            .map(|b| b.file_name())
            .collect();
        assert_eq!(names, vec!["new.zip", "middle.zip", "old.zip"]);
    }

    #[test]
    fn test_display_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("prod.zip"), 0);
        let backup = &list_backups(dir.path(), "zip").unwrap()[0];
        assert!(backup.display_name().ends_with(" - prod.zip"));
        assert_eq!(backup.display_name().len(), "YYYY-MM-DD HH:MM - prod.zip".len());
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = list_backups(&dir.path().join("nope"), "zip").unwrap_err();
        assert!(matches!(err, BackupError::UnreadableDir(..)));
    }

    #[test]
    fn test_extract_with_filestore() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("b.zip");
        write_zip(
            &archive,
            &[
                ("dump.sql", "CREATE TABLE x();"),
                ("manifest.json", "{}"),
                ("filestore/ab/abcdef", "blob"),
            ],
        );

        let staging = dir.path().join("temp");
        let extracted = extract(&archive, &staging).unwrap();
        assert_eq!(extracted.dump, staging.join("dump.sql"));
        assert_eq!(extracted.filestore, Some(staging.join("filestore")));
        assert!(staging.join("filestore/ab/abcdef").is_file());
    }

    #[test]
    fn test_extract_without_dump_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("b.zip");
        write_zip(&archive, &[("manifest.json", "{}")]);

        let err = extract(&archive, &dir.path().join("temp")).unwrap_err();
        assert!(matches!(err, BackupError::MissingDump(_)));
    }

    #[test]
    fn test_extract_clears_stale_staging() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("temp");
        fs::create_dir_all(staging.join("filestore")).unwrap();
        fs::write(staging.join("dump.sql"), "stale").unwrap();

        let archive = dir.path().join("b.zip");
        write_zip(&archive, &[("readme.txt", "no dump here")]);

        assert!(matches!(extract(&archive, &staging), Err(BackupError::MissingDump(_))));
        assert!(!staging.join("dump.sql").exists());
        assert!(!staging.join("filestore").exists());
    }
}
