use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem for exercising the pipelines without touching disk.
///
/// Besides plain files it can script a sequence of sizes for a path, which
/// is how tests simulate an archive that is still growing.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, u64>,
    dirs: HashSet<PathBuf>,
    /// Sizes reported by successive `file_size` calls before falling back
    /// to the stored size.
    growth: HashMap<PathBuf, VecDeque<u64>>,
    removed: Vec<PathBuf>,
    size_calls: usize,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, size: u64) {
        let mut state = self.inner.lock().unwrap();
        state.files.insert(path.as_ref().to_path_buf(), size);
    }

    /// Report `sizes` in order from `file_size` before settling on the last
    /// one.
    pub fn add_growing_file(&self, path: impl AsRef<Path>, sizes: &[u64]) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.inner.lock().unwrap();
        let last = sizes.last().copied().unwrap_or(0);
        state.files.insert(path.clone(), last);
        state.growth.insert(path, sizes.iter().copied().collect());
    }

    pub fn delete(&self, path: impl AsRef<Path>) {
        let mut state = self.inner.lock().unwrap();
        state.files.remove(path.as_ref());
    }

    /// Paths passed to `remove_file`, in call order.
    pub fn removed(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().removed.clone()
    }

    pub fn size_calls(&self) -> usize {
        self.inner.lock().unwrap().size_calls
    }

    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().unwrap().dirs.contains(path.as_ref())
    }
}

impl FileSystem for MockFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().files.contains_key(path)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let mut state = self.inner.lock().unwrap();
        state.size_calls += 1;
        if !state.files.contains_key(path) {
            return Err(anyhow!("File not found: {:?}", path));
        }
        if let Some(next) = state.growth.get_mut(path).and_then(|q| q.pop_front()) {
            return Ok(next);
        }
        Ok(state.files[path])
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.removed.push(path.to_path_buf());
        match state.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }
}
