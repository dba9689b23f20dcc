//! Size-rotating log file.
//!
//! The active file keeps its configured name. Once it would grow past
//! `max_size` megabytes it is renamed to `<name>.1` (older backups shift to
//! `.2`, `.3`, ...), gzipped when `compress` is set, and at most
//! `max_backups` backups are kept. Backups last modified more than `max_age`
//! days ago are deleted at startup and after every rotation.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};

use super::logger::LoggerError;
use crate::configs::LoggerSettings;

const MEGABYTE: usize = 1024 * 1024;
/// Size limit used when `max_size` is 0.
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
struct RotationPolicy {
    path: PathBuf,
    max_bytes: usize,
    max_backups: usize,
    max_age: Option<Duration>,
    compress: bool,
}

impl RotationPolicy {
    fn from_settings(settings: &LoggerSettings) -> Self {
        let size_mb = if settings.max_size == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            settings.max_size
        };
        let max_bytes = usize::try_from(size_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(MEGABYTE);
        // 0 keeps every backup
        let max_backups = if settings.max_backups == 0 {
            usize::MAX
        } else {
            settings.max_backups
        };
        let max_age = (settings.max_age > 0)
            .then(|| Duration::from_secs(settings.max_age.saturating_mul(SECONDS_PER_DAY)));

        Self {
            path: PathBuf::from(&settings.file_name),
            max_bytes,
            max_backups,
            max_age,
            compress: settings.compress,
        }
    }

    fn open(&self) -> FileRotate<AppendCount> {
        let compression = if self.compress {
            Compression::OnRotate(0)
        } else {
            Compression::None
        };
        FileRotate::new(
            &self.path,
            AppendCount::new(self.max_backups),
            ContentLimit::Bytes(self.max_bytes),
            compression,
            #[cfg(unix)]
            None,
        )
    }

    /// Rotated siblings of the active file: `<name>.<n>` and `<name>.<n>.gz`.
    fn backups(&self) -> Vec<PathBuf> {
        let Some(name) = self.path.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let prefix = format!("{}.", name);
        let Ok(entries) = fs::read_dir(parent_dir(&self.path)) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix(&prefix))
                    .and_then(|suffix| suffix.trim_end_matches(".gz").parse::<usize>().ok())
                    .is_some()
            })
            .map(|e| e.path())
            .collect()
    }

    /// Deletes backups older than `max_age`; returns how many went.
    fn prune_expired(&self) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let now = SystemTime::now();
        self.backups()
            .into_iter()
            .filter(|path| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > max_age)
            })
            .filter(|path| fs::remove_file(path).is_ok())
            .count()
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// # Size Rotating File
///
/// `io::Write` sink handed to `tracing_appender::non_blocking`.
pub struct SizeRotatingFile {
    policy: RotationPolicy,
    inner: FileRotate<AppendCount>,
    since_prune: usize,
}

impl SizeRotatingFile {
    /// Opens (or appends to) the file named in `settings`, creating its
    /// directory when missing.
    ///
    /// # Errors
    /// `LoggerError::FileSink` when the directory cannot be created.
    pub fn open(settings: &LoggerSettings) -> Result<Self, LoggerError> {
        let policy = RotationPolicy::from_settings(settings);
        fs::create_dir_all(parent_dir(&policy.path)).map_err(|e| LoggerError::FileSink {
            path: settings.file_name.clone(),
            reason: e.to_string(),
        })?;
        policy.prune_expired();
        let inner = policy.open();
        Ok(Self {
            policy,
            inner,
            since_prune: 0,
        })
    }
}

impl Write for SizeRotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.since_prune = self.since_prune.saturating_add(written);
        // at most one rotation can have happened since the last check
        if self.since_prune >= self.policy.max_bytes {
            self.since_prune = 0;
            if self.policy.prune_expired() > 0 {
                self.inner.flush()?;
                self.inner = self.policy.open();
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn settings(dir: &Path, max_backups: usize, compress: bool) -> LoggerSettings {
        LoggerSettings {
            output_console: false,
            output_file: true,
            file_name: dir.join("search.log").to_string_lossy().to_string(),
            max_size: 1,
            max_backups,
            compress,
            ..Default::default()
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn write_kib_lines(file: &mut SizeRotatingFile, lines: usize) {
        let line = format!("{}\n", "x".repeat(1023));
        for _ in 0..lines {
            file.write_all(line.as_bytes()).unwrap();
        }
        file.flush().unwrap();
    }

    #[test]
    fn test_policy_defaults_for_zero_values() {
        let policy = RotationPolicy::from_settings(&LoggerSettings {
            max_size: 0,
            max_backups: 0,
            max_age: 0,
            ..Default::default()
        });
        assert_eq!(policy.max_bytes, 100 * MEGABYTE);
        assert_eq!(policy.max_backups, usize::MAX);
        assert!(policy.max_age.is_none());
    }

    #[test]
    fn test_rotates_past_max_size_and_keeps_max_backups() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SizeRotatingFile::open(&settings(dir.path(), 2, false)).unwrap();

        write_kib_lines(&mut file, 3500);
        drop(file);

        let names = file_names(dir.path());
        assert_eq!(names, vec!["search.log", "search.log.1", "search.log.2"]);
        for name in &names {
            let size = fs::metadata(dir.path().join(name)).unwrap().len();
            assert!(size <= MEGABYTE as u64, "{} is {} bytes", name, size);
        }
    }

    #[test]
    fn test_compressed_backups() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SizeRotatingFile::open(&settings(dir.path(), 3, true)).unwrap();

        write_kib_lines(&mut file, 1500);
        drop(file);

        let names = file_names(dir.path());
        assert!(names.contains(&"search.log".to_string()));
        assert!(names.contains(&"search.log.1.gz".to_string()), "{:?}", names);
    }

    #[test]
    fn test_expired_backups_pruned_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("search.log.1");
        let fresh = dir.path().join("search.log.2");
        let unrelated = dir.path().join("other.log.1");
        let ten_days_ago = SystemTime::now() - Duration::from_secs(10 * SECONDS_PER_DAY);
        for path in [&stale, &fresh, &unrelated] {
            File::create(path).unwrap();
        }
        File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(ten_days_ago)
            .unwrap();
        File::options()
            .write(true)
            .open(&unrelated)
            .unwrap()
            .set_modified(ten_days_ago)
            .unwrap();

        let mut s = settings(dir.path(), 5, false);
        s.max_age = 7;
        let _file = SizeRotatingFile::open(&s).unwrap();

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
    }
}
