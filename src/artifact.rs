use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, VeloraError};

/// All provisional files carry this marker so an interrupted run can never
/// pollute a later run's newest-file lookup.
const PROVISIONAL_MARKER: &str = ".velora-";

/// Owns a job's working directory: provisional naming, sweeps, promotion of
/// the finished artifact, and cleanup on failure paths.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    work_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.work_dir)?;
        Ok(())
    }

    /// Provisional prefix for acquisition strategy `index`. Distinct per
    /// strategy so stale partial files are attributable.
    pub fn strategy_prefix(index: usize) -> String {
        format!("{}s{}-", PROVISIONAL_MARKER, index)
    }

    /// Output template handed to the fetch tool: prefix + title + extension.
    pub fn output_template(&self, prefix: &str) -> String {
        self.work_dir
            .join(format!("{}%(title)s.%(ext)s", prefix))
            .to_string_lossy()
            .to_string()
    }

    /// Provisional path for a pipeline stage's output file.
    pub fn stage_path(&self, stage: &str, final_name: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}stage-{}-{}", PROVISIONAL_MARKER, stage, final_name))
    }

    /// Delete every file in the working directory carrying `prefix`.
    pub fn sweep_prefix(&self, prefix: &str) -> Result<usize> {
        let mut removed = 0;
        for path in self.files_with_prefix(prefix)? {
            debug!("Sweeping provisional file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Delete every provisional file, whatever prefix produced it.
    pub fn sweep_all_provisional(&self) -> Result<usize> {
        self.sweep_prefix(PROVISIONAL_MARKER)
    }

    /// Delete provisional files anywhere under the directory, batch
    /// subdirectories included. Used on user interrupt, where the per-job
    /// guards never get to run.
    pub fn sweep_tree_provisional(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in WalkDir::new(&self.work_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(PROVISIONAL_MARKER)
            {
                debug!("Sweeping provisional file: {}", entry.path().display());
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Most recently modified file carrying `prefix`. Modification time is
    /// the tie-break, never name ordering: stale files from earlier failed
    /// strategies must not win.
    pub fn newest_with_prefix(&self, prefix: &str) -> Result<Option<PathBuf>> {
        let newest = self
            .files_with_prefix(prefix)?
            .into_iter()
            .max_by_key(|path| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH)
            });
        Ok(newest)
    }

    /// Strip the provisional prefix from a finished artifact's name and move
    /// it into place, replacing any previous download of the same title.
    pub fn promote(&self, path: &Path, prefix: &str) -> Result<PathBuf> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VeloraError::FileNotFound(path.display().to_string()))?;
        let final_name = name.strip_prefix(prefix).unwrap_or(name);
        let final_path = self.work_dir.join(final_name);

        fs::rename(path, &final_path)?;
        debug!("Promoted {} -> {}", path.display(), final_path.display());
        Ok(final_path)
    }

    /// Atomically replace `dst` with `src`. Used by pipeline stages so that
    /// at most one full copy of the artifact survives a stage.
    pub fn replace(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::rename(src, dst)?;
        Ok(())
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    /// The most recent non-provisional downloads with their sizes in bytes,
    /// newest first.
    pub fn recent_downloads(&self, limit: usize) -> Result<Vec<(PathBuf, u64)>> {
        let mut entries: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
        for entry in WalkDir::new(&self.work_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with(PROVISIONAL_MARKER) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                entries.push((entry.path().to_path_buf(), meta.len(), modified));
            }
        }
        entries.sort_by(|a, b| b.2.cmp(&a.2));
        entries.truncate(limit);
        Ok(entries.into_iter().map(|(p, len, _)| (p, len)).collect())
    }

    fn files_with_prefix(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        if !self.work_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.work_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                files.push(entry.path().to_path_buf());
            }
        }
        Ok(files)
    }
}

/// Removes every provisional file in the working directory when dropped,
/// unless disarmed. Arm one per job so that early returns, classification
/// failures, and panics all leave the directory clean.
pub struct CleanupGuard {
    manager: ArtifactManager,
    armed: bool,
}

impl CleanupGuard {
    pub fn new(manager: ArtifactManager) -> Self {
        Self {
            manager,
            armed: true,
        }
    }

    /// Call once the final artifact is in place under its real name.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.manager.sweep_all_provisional() {
            Ok(0) => {}
            Ok(n) => debug!("Cleanup guard removed {} provisional file(s)", n),
            Err(e) => warn!("Cleanup guard failed to sweep working directory: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_newest_wins_by_mtime_not_name() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        touch(dir.path(), ".velora-s0-zzz.mp4");
        sleep(Duration::from_millis(50));
        touch(dir.path(), ".velora-s0-aaa.mp4");

        let newest = manager
            .newest_with_prefix(&ArtifactManager::strategy_prefix(0))
            .unwrap()
            .unwrap();
        assert_eq!(newest.file_name().unwrap(), ".velora-s0-aaa.mp4");
    }

    #[test]
    fn test_sweep_removes_only_matching_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        touch(dir.path(), ".velora-s0-a.mp4");
        touch(dir.path(), ".velora-s1-b.mp4");
        touch(dir.path(), "keep.mp4");

        let removed = manager
            .sweep_prefix(&ArtifactManager::strategy_prefix(0))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join(".velora-s0-a.mp4").exists());
        assert!(dir.path().join(".velora-s1-b.mp4").exists());
        assert!(dir.path().join("keep.mp4").exists());
    }

    #[test]
    fn test_promote_strips_provisional_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        let provisional = touch(dir.path(), ".velora-s1-My Title.mp4");
        let final_path = manager
            .promote(&provisional, &ArtifactManager::strategy_prefix(1))
            .unwrap();

        assert_eq!(final_path.file_name().unwrap(), "My Title.mp4");
        assert!(final_path.exists());
        assert!(!provisional.exists());
    }

    #[test]
    fn test_promote_replaces_existing_download() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        touch(dir.path(), "Clip.mp4");
        let provisional = touch(dir.path(), ".velora-s0-Clip.mp4");
        let final_path = manager
            .promote(&provisional, &ArtifactManager::strategy_prefix(0))
            .unwrap();

        assert_eq!(final_path, dir.path().join("Clip.mp4"));
        assert!(final_path.exists());
    }

    #[test]
    fn test_cleanup_guard_sweeps_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        touch(dir.path(), ".velora-s0-partial.mp4");
        touch(dir.path(), "finished.mp4");

        drop(CleanupGuard::new(manager));

        assert!(!dir.path().join(".velora-s0-partial.mp4").exists());
        assert!(dir.path().join("finished.mp4").exists());
    }

    #[test]
    fn test_disarmed_guard_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        touch(dir.path(), ".velora-s0-partial.mp4");

        let mut guard = CleanupGuard::new(manager);
        guard.disarm();
        drop(guard);

        assert!(dir.path().join(".velora-s0-partial.mp4").exists());
    }

    #[test]
    fn test_tree_sweep_reaches_batch_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        let batch = dir.path().join("batch-20250309-143005");
        fs::create_dir(&batch).unwrap();
        touch(&batch, ".velora-s0-partial.mp4");
        touch(&batch, "finished.mp4");
        touch(dir.path(), ".velora-s1-toplevel.mp4");

        let removed = manager.sweep_tree_provisional().unwrap();
        assert_eq!(removed, 2);
        assert!(batch.join("finished.mp4").exists());
        assert!(!batch.join(".velora-s0-partial.mp4").exists());
    }

    #[test]
    fn test_recent_downloads_skips_provisional_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());

        touch(dir.path(), "old.mp4");
        sleep(Duration::from_millis(50));
        touch(dir.path(), ".velora-s0-tmp.mp4");
        touch(dir.path(), "new.mp4");

        let recent = manager.recent_downloads(5).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].0.file_name().unwrap(), "new.mp4");
    }
}
