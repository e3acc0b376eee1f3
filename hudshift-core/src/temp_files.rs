//! Temporary file management for render jobs.
//!
//! Each job owns one `TempFileScope`: a directory under the temp root named
//! `hudshift_<pid>_<millis>_<random>`, holding the core and intro encodes,
//! the concat manifest and the caption text. The scope is released exactly
//! once, explicitly through `release()` or implicitly on drop, so no exit
//! path leaves files behind. Leftovers from crashed processes carry the same
//! prefix and are removed by `sweep_stale`.

use crate::error::{CoreError, CoreResult};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::{Builder as TempFileBuilder, TempDir};

/// Prefix shared by every scope directory.
pub const SCOPE_PREFIX: &str = "hudshift_";

/// Files an encoder may write next to a pass-log prefix.
pub const PASS_LOG_SUFFIXES: [&str; 4] = [
    "-0.log",
    "-0.log.mbtree",
    "-0.log.temp",
    "-0.log.mbtree.temp",
];

/// Scoped scratch directory of a single render job.
#[derive(Debug)]
pub struct TempFileScope {
    dir: Option<TempDir>,
    path: PathBuf,
    tracked: Vec<PathBuf>,
}

impl TempFileScope {
    /// Creates a fresh scope directory under `root`.
    pub fn create(root: &Path) -> CoreResult<Self> {
        fs::create_dir_all(root).map_err(|e| CoreError::temp_io(root, e))?;
        let prefix = format!(
            "{SCOPE_PREFIX}{}_{}_",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        );
        let dir = TempFileBuilder::new()
            .prefix(&prefix)
            .tempdir_in(root)
            .map_err(|e| CoreError::temp_io(root, e))?;
        let path = dir.path().to_path_buf();
        log::debug!("Created temp scope {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            tracked: Vec::new(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reserves `name` inside the scope. The file is not created.
    pub fn file(&mut self, name: &str) -> PathBuf {
        let path = self.path.join(name);
        if !self.tracked.contains(&path) {
            self.tracked.push(path.clone());
        }
        path
    }

    /// Writes `contents` to `name` inside the scope.
    pub fn write_file(&mut self, name: &str, contents: &str) -> CoreResult<PathBuf> {
        let path = self.file(name);
        fs::write(&path, contents).map_err(|e| CoreError::temp_io(&path, e))?;
        Ok(path)
    }

    /// Paths handed out so far.
    #[must_use]
    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    /// Removes everything the scope owns. Reports the first failure.
    pub fn release(mut self) -> CoreResult<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> CoreResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        for path in &self.tracked {
            let companions = PASS_LOG_SUFFIXES.iter().map(|suffix| {
                let mut name = path.as_os_str().to_os_string();
                name.push(suffix);
                PathBuf::from(name)
            });
            for candidate in std::iter::once(path.clone()).chain(companions) {
                match fs::remove_file(&candidate) {
                    Ok(()) => log::trace!("Removed {}", candidate.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(CoreError::temp_io(candidate, e)),
                }
            }
        }
        dir.close().map_err(|e| CoreError::temp_io(&self.path, e))?;
        log::debug!("Released temp scope {}", self.path.display());
        Ok(())
    }
}

impl Drop for TempFileScope {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            log::warn!("Failed to clean up temp scope {}: {e}", self.path.display());
        }
    }
}

/// Returns a temporary file path with random suffix. Does not create the file.
#[must_use]
pub fn create_temp_file_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let random_suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    dir.join(format!("{prefix}.{random_suffix}.{extension}"))
}

/// Hidden sibling of `output` used while the final file is being written.
#[must_use]
pub fn partial_output_path(output: &Path) -> PathBuf {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = crate::utils::file_stem_or_default(output);
    create_temp_file_path(dir, &format!(".{stem}"), "partial.mp4")
}

/// Removes scope directories under `root` older than `max_age`. Returns how many were removed.
pub fn sweep_stale(root: &Path, max_age: Duration) -> CoreResult<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CoreError::temp_io(root, e)),
    };
    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(SCOPE_PREFIX) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if metadata.is_dir() && age >= max_age {
            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    log::info!("Removed stale temp scope {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Could not remove stale temp scope {}: {e}", path.display()),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_names_carry_prefix_and_pid() {
        let root = tempfile::tempdir().expect("root");
        let scope = TempFileScope::create(root.path()).expect("scope");
        let name = scope
            .path()
            .file_name()
            .expect("name")
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with(&format!("{SCOPE_PREFIX}{}_", std::process::id())));
    }

    #[test]
    fn release_removes_files_and_pass_logs() {
        let root = tempfile::tempdir().expect("root");
        let mut scope = TempFileScope::create(root.path()).expect("scope");
        let manifest = scope.write_file("concat.txt", "file 'a'\n").expect("write");
        let core = scope.file("core.mp4");
        fs::write(&core, b"video").expect("core");
        fs::write(format!("{}-0.log", core.display()), b"stats").expect("passlog");
        let dir = scope.path().to_path_buf();

        scope.release().expect("release");
        assert!(!manifest.exists());
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).expect("read").count(), 0);
    }

    #[test]
    fn drop_cleans_up_without_release() {
        let root = tempfile::tempdir().expect("root");
        let dir = {
            let mut scope = TempFileScope::create(root.path()).expect("scope");
            scope.write_file("overlay_text.txt", "GG").expect("write");
            scope.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn sweep_only_touches_prefixed_dirs() {
        let root = tempfile::tempdir().expect("root");
        fs::create_dir(root.path().join("hudshift_1_2_abc")).expect("stale");
        fs::create_dir(root.path().join("unrelated")).expect("other");
        let removed = sweep_stale(root.path(), Duration::ZERO).expect("sweep");
        assert_eq!(removed, 1);
        assert!(root.path().join("unrelated").exists());
    }

    #[test]
    fn partial_path_is_hidden_sibling() {
        let partial = partial_output_path(Path::new("/renders/clip.mp4"));
        assert_eq!(partial.parent(), Some(Path::new("/renders")));
        let name = partial.file_name().expect("name").to_string_lossy().into_owned();
        assert!(name.starts_with(".clip."));
        assert!(name.ends_with(".partial.mp4"));
    }
}
