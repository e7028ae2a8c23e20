//! Delivery of CSV reports to a download sink
//!
//! Serialization stays pure in [`crate::services::csv_export`]; everything that
//! touches the outside world goes through [`CsvEmitter`].

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::{Result, VoxmeterError};

/// Byte-order mark so spreadsheet tools detect UTF-8
pub const UTF8_BOM: char = '\u{FEFF}';

/// MIME type of emitted reports
pub const CSV_CONTENT_TYPE: &str = "text/csv;charset=utf-8";

/// Sink for a finished report file (`text/csv;charset=utf-8` bytes)
pub trait CsvEmitter {
    fn emit(&mut self, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Prepend the BOM and hand the report to `emitter`
pub fn download_csv<E>(emitter: &mut E, filename: &str, csv: &str) -> Result<()>
where
    E: CsvEmitter + ?Sized,
{
    let payload = format!("{}{}", UTF8_BOM, csv);
    emitter.emit(filename, payload.as_bytes())
}

/// Writes reports into a directory
pub struct FileEmitter {
    dir: PathBuf,
}

impl FileEmitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination path; the filename must be a bare file name
    pub fn target_path(&self, filename: &str) -> Result<PathBuf> {
        let bare = Path::new(filename)
            .file_name()
            .is_some_and(|name| name == filename);
        if !bare || filename.is_empty() {
            return Err(VoxmeterError::Export(format!(
                "Invalid export filename: {:?}",
                filename
            )));
        }
        Ok(self.dir.join(filename))
    }

    /// Caller must hold the sidecar lock
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("csv.tmp");
        {
            let mut file = File::create(&temp_path)
                .map_err(|e| VoxmeterError::Export(format!("Failed to create temp file: {}", e)))?;
            file.write_all(bytes)
                .map_err(|e| VoxmeterError::Export(format!("Failed to write temp file: {}", e)))?;
            file.sync_all()
                .map_err(|e| VoxmeterError::Export(format!("Failed to sync temp file: {}", e)))?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(VoxmeterError::Export(format!(
                "Failed to rename temp file: {}",
                e
            )));
        }
        Ok(())
    }
}

impl CsvEmitter for FileEmitter {
    /// Atomic write (temp file + rename) while holding an exclusive lock on a
    /// `<name>.lock` sidecar, so concurrent exports of one file serialize
    fn emit(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = self.target_path(filename)?;
        fs::create_dir_all(&self.dir)?;

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(format!("{}.lock", filename)))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| VoxmeterError::Export(format!("Failed to acquire write lock: {}", e)))?;

        let result = Self::write_atomic(&path, bytes);
        let _ = lock_file.unlock();
        result?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "exported usage report");
        Ok(())
    }
}

/// A report captured by [`MemoryEmitter`]
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Keeps emitted reports in memory (embedding hosts, tests)
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    pub files: Vec<EmittedFile>,
}

impl CsvEmitter for MemoryEmitter {
    fn emit(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        self.files.push(EmittedFile {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BOM_BYTES: [u8; 3] = [0xEF, 0xBB, 0xBF];

    #[test]
    fn test_download_csv_prepends_bom() {
        let mut emitter = MemoryEmitter::default();
        download_csv(&mut emitter, "usage.csv", "a,b\n").unwrap();

        assert_eq!(emitter.files.len(), 1);
        let file = &emitter.files[0];
        assert_eq!(file.filename, "usage.csv");
        assert_eq!(&file.bytes[..3], &BOM_BYTES);
        assert_eq!(&file.bytes[3..], b"a,b\n");
    }

    #[test]
    fn test_file_emitter_writes_report() {
        let tmp = TempDir::new().unwrap();
        let mut emitter = FileEmitter::new(tmp.path().join("exports"));

        download_csv(&mut emitter, "report.csv", "h1,h2\n1,2\n").unwrap();

        let written = fs::read(tmp.path().join("exports").join("report.csv")).unwrap();
        assert_eq!(&written[..3], &BOM_BYTES);
        assert_eq!(&written[3..], b"h1,h2\n1,2\n");
        assert!(!tmp.path().join("exports").join("report.csv.tmp").exists());
    }

    #[test]
    fn test_file_emitter_overwrites_existing() {
        let tmp = TempDir::new().unwrap();
        let mut emitter = FileEmitter::new(tmp.path());

        download_csv(&mut emitter, "report.csv", "old,longer,content\n").unwrap();
        download_csv(&mut emitter, "report.csv", "new\n").unwrap();

        let written = fs::read(tmp.path().join("report.csv")).unwrap();
        assert_eq!(&written[3..], b"new\n");
    }

    #[test]
    fn test_file_emitter_concurrent_exports() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();

        let payloads: Vec<String> = (0..4)
            .map(|n| format!("writer,{}\n", n).repeat(20_000))
            .collect();

        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let mut emitter = FileEmitter::new(dir);
                    (0..20)
                        .map(|_| download_csv(&mut emitter, "report.csv", &payload))
                        .filter(|r| r.is_err())
                        .count()
                })
            })
            .collect();

        let failures: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(failures, 0);

        let written = fs::read(dir.join("report.csv")).unwrap();
        assert_eq!(&written[..3], &BOM_BYTES);
        let body = &written[3..];
        assert!(payloads.iter().any(|p| p.as_bytes() == body));
        assert!(!dir.join("report.csv.tmp").exists());
    }

    #[test]
    fn test_file_emitter_rejects_paths() {
        let tmp = TempDir::new().unwrap();
        let mut emitter = FileEmitter::new(tmp.path());

        assert!(emitter.emit("../escape.csv", b"x").is_err());
        assert!(emitter.emit("nested/report.csv", b"x").is_err());
        assert!(emitter.emit("", b"x").is_err());
    }
}
