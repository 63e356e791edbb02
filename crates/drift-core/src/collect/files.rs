//! File collector: walks configured base paths and records metadata plus
//! a content hash per entry.
//!
//! One walker thread feeds a bounded job channel (capacity 1000) consumed
//! by a pool of hashing workers; a full channel blocks the walker, which
//! is the only backpressure mechanism. Permission errors while walking are
//! skipped; unreadable files produce a record without a hash. Regular
//! files of 100 MiB or more are never hashed.

use crate::model::FileInfo;
use chrono::{DateTime, Utc};
use drift_common::{mode_string, CollectError, Deadline};
use drift_config::{compile_patterns, FilesConfig, HashAlgo};
use md5::Md5;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::debug;
use walkdir::WalkDir;

/// Files at or above this size are recorded without a hash.
const MAX_HASH_SIZE: u64 = 100 * 1024 * 1024;

/// Collect file metadata for every configured base path.
///
/// Always returns the entries gathered so far; the error slot is set only
/// when the deadline cut the walk short.
pub fn collect_files(
    config: &FilesConfig,
    workers: usize,
    deadline: &Deadline,
) -> (BTreeMap<String, FileInfo>, Option<CollectError>) {
    let excludes = Arc::new(compile_patterns(&config.exclude_paths));
    let cancelled = Arc::new(AtomicBool::new(false));
    let mut files = BTreeMap::new();

    thread::scope(|scope| {
        let (job_tx, job_rx) = mpsc::sync_channel::<FileJob>(1000);
        let (result_tx, result_rx) = mpsc::channel::<FileInfo>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        for _ in 0..workers.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let cancelled = Arc::clone(&cancelled);
            let hash_algo = config.hash_algo;
            let deadline = *deadline;
            scope.spawn(move || {
                loop {
                    let job = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let job = match job {
                        Ok(job) => job,
                        Err(_) => break,
                    };
                    // once expired, keep draining so the walker never
                    // blocks on a full channel, but stop producing
                    if deadline.check().is_err() {
                        cancelled.store(true, Ordering::SeqCst);
                        continue;
                    }
                    let _ = result_tx.send(process_entry(&job, hash_algo));
                }
            });
        }
        drop(result_tx);

        {
            let job_tx = job_tx;
            let excludes = Arc::clone(&excludes);
            let cancelled = Arc::clone(&cancelled);
            let paths = config.paths.clone();
            let follow_links = config.follow_links;
            let max_depth = config.max_depth;
            let deadline = *deadline;
            scope.spawn(move || {
                walk_paths(
                    &paths,
                    follow_links,
                    max_depth,
                    &excludes,
                    &deadline,
                    &cancelled,
                    &job_tx,
                );
            });
        }

        for info in result_rx {
            files.insert(info.path.clone(), info);
        }
    });

    debug!(count = files.len(), "file collection finished");
    let error = cancelled
        .load(Ordering::SeqCst)
        .then_some(CollectError::Cancelled);
    (files, error)
}

struct FileJob {
    path: String,
    size: u64,
    mode: u32,
    uid: u32,
    gid: u32,
    mod_time: Option<DateTime<Utc>>,
    is_directory: bool,
}

fn walk_paths(
    paths: &[String],
    follow_links: bool,
    max_depth: usize,
    excludes: &[Regex],
    deadline: &Deadline,
    cancelled: &AtomicBool,
    job_tx: &mpsc::SyncSender<FileJob>,
) {
    for base in paths {
        let mut walker = WalkDir::new(base).follow_links(follow_links).into_iter();
        loop {
            if deadline.check().is_err() {
                cancelled.store(true, Ordering::SeqCst);
                return;
            }

            let entry = match walker.next() {
                Some(Ok(entry)) => entry,
                // permission errors and dangling links are skipped
                Some(Err(_)) => continue,
                None => break,
            };

            let path = entry.path().to_string_lossy().to_string();
            let is_dir = entry.file_type().is_dir();

            if excludes.iter().any(|re| re.is_match(&path)) {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            if max_depth > 0 && entry.depth() > max_depth {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };

            let job = FileJob {
                path,
                size: metadata.len(),
                mode: raw_mode(&metadata),
                uid: file_uid(&metadata),
                gid: file_gid(&metadata),
                mod_time: metadata.modified().ok().map(DateTime::<Utc>::from),
                is_directory: is_dir,
            };

            // blocks when the channel is full until a worker drains it
            if job_tx.send(job).is_err() {
                return;
            }
        }
    }
}

fn process_entry(job: &FileJob, hash_algo: HashAlgo) -> FileInfo {
    let hash = if !job.is_directory && job.size < MAX_HASH_SIZE {
        hash_file(Path::new(&job.path), hash_algo).unwrap_or_default()
    } else {
        String::new()
    };

    FileInfo {
        path: job.path.clone(),
        hash,
        size: job.size,
        mode: mode_string(job.mode),
        mod_time: job.mod_time,
        owner: owner_name(job.uid),
        group: group_name(job.gid),
        is_directory: job.is_directory,
        exists: true,
    }
}

fn hash_file(path: &Path, algo: HashAlgo) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    match algo {
        HashAlgo::Sha256 => {
            let mut hasher = Sha256::new();
            std::io::copy(&mut file, &mut hasher).ok()?;
            Some(hex::encode(hasher.finalize()))
        }
        HashAlgo::Md5 => {
            let mut hasher = Md5::new();
            std::io::copy(&mut file, &mut hasher).ok()?;
            Some(hex::encode(hasher.finalize()))
        }
    }
}

#[cfg(unix)]
fn raw_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(unix)]
fn file_uid(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.uid()
}

#[cfg(unix)]
fn file_gid(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.gid()
}

#[cfg(not(unix))]
fn raw_mode(_metadata: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(not(unix))]
fn file_uid(_metadata: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(not(unix))]
fn file_gid(_metadata: &std::fs::Metadata) -> u32 {
    0
}

/// UID → name, empty string when the lookup fails. Results are cached for
/// the lifetime of the process.
#[cfg(unix)]
fn owner_name(uid: u32) -> String {
    use once_cell::sync::Lazy;
    use std::collections::HashMap;

    static CACHE: Lazy<Mutex<HashMap<u32, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));
    if let Ok(cache) = CACHE.lock() {
        if let Some(name) = cache.get(&uid) {
            return name.clone();
        }
    }
    let name = lookup_passwd_name(uid).unwrap_or_default();
    if let Ok(mut cache) = CACHE.lock() {
        cache.insert(uid, name.clone());
    }
    name
}

#[cfg(unix)]
fn group_name(gid: u32) -> String {
    use once_cell::sync::Lazy;
    use std::collections::HashMap;

    static CACHE: Lazy<Mutex<HashMap<u32, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));
    if let Ok(cache) = CACHE.lock() {
        if let Some(name) = cache.get(&gid) {
            return name.clone();
        }
    }
    let name = lookup_group_name(gid).unwrap_or_default();
    if let Ok(mut cache) = CACHE.lock() {
        cache.insert(gid, name.clone());
    }
    name
}

#[cfg(unix)]
fn lookup_passwd_name(uid: u32) -> Option<String> {
    let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0u8; 4096];
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    let rc = unsafe {
        libc::getpwuid_r(
            uid,
            &mut passwd,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(passwd.pw_name) };
    Some(name.to_string_lossy().to_string())
}

#[cfg(unix)]
fn lookup_group_name(gid: u32) -> Option<String> {
    let mut group: libc::group = unsafe { std::mem::zeroed() };
    let mut buf = vec![0u8; 4096];
    let mut result: *mut libc::group = std::ptr::null_mut();
    let rc = unsafe {
        libc::getgrgid_r(
            gid,
            &mut group,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(group.gr_name) };
    Some(name.to_string_lossy().to_string())
}

#[cfg(not(unix))]
fn owner_name(_uid: u32) -> String {
    String::new()
}

#[cfg(not(unix))]
fn group_name(_gid: u32) -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_for(dir: &Path) -> FilesConfig {
        FilesConfig {
            enabled: true,
            paths: vec![dir.to_string_lossy().to_string()],
            exclude_paths: Vec::new(),
            follow_links: false,
            max_depth: 0,
            hash_algo: HashAlgo::Sha256,
        }
    }

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> String {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_collects_files_with_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.conf", b"hello");

        let (files, error) = collect_files(&config_for(dir.path()), 2, &Deadline::none());
        assert!(error.is_none());

        let info = &files[&path];
        assert!(!info.is_directory);
        assert_eq!(info.size, 5);
        // sha256("hello")
        assert_eq!(
            info.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(info.exists);
        assert!(info.mode.starts_with('-'));
    }

    #[test]
    fn test_md5_hash_algo() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.conf", b"hello");
        let mut config = config_for(dir.path());
        config.hash_algo = HashAlgo::Md5;

        let (files, _) = collect_files(&config, 2, &Deadline::none());
        // md5("hello")
        assert_eq!(files[&path].hash, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_directories_have_empty_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let (files, _) = collect_files(&config_for(dir.path()), 2, &Deadline::none());
        let sub = &files[&dir.path().join("sub").to_string_lossy().to_string()];
        assert!(sub.is_directory);
        assert!(sub.hash.is_empty());
        assert!(sub.mode.starts_with('d'));
    }

    #[test]
    fn test_exclude_pattern_prunes_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let keep = write_file(dir.path(), "keep.conf", b"keep");
        std::fs::create_dir(dir.path().join("skipme")).unwrap();
        write_file(&dir.path().join("skipme"), "hidden.conf", b"hidden");

        let mut config = config_for(dir.path());
        config.exclude_paths = vec!["skipme".to_string()];

        let (files, _) = collect_files(&config, 2, &Deadline::none());
        assert!(files.contains_key(&keep));
        assert!(!files.keys().any(|k| k.contains("skipme")));
    }

    #[test]
    fn test_max_depth_prunes() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "top.conf", b"top");
        std::fs::create_dir(dir.path().join("deep")).unwrap();
        write_file(&dir.path().join("deep"), "nested.conf", b"nested");

        let mut config = config_for(dir.path());
        config.max_depth = 1;

        let (files, _) = collect_files(&config, 2, &Deadline::none());
        assert!(files.keys().any(|k| k.ends_with("top.conf")));
        assert!(files.keys().any(|k| k.ends_with("deep")));
        assert!(!files.keys().any(|k| k.ends_with("nested.conf")));
    }

    #[test]
    fn test_expired_deadline_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.conf", b"a");

        let deadline = Deadline::at(std::time::Instant::now() - std::time::Duration::from_secs(1));
        let (_, error) = collect_files(&config_for(dir.path()), 2, &deadline);
        assert!(matches!(error, Some(CollectError::Cancelled)));
    }
}
