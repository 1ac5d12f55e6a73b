use color_eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Default debug log name inside the cache directory
pub const LOG_FILE: &str = "dataportal.log";

/// Files `clear_all` removes
const CACHE_FILES: &[&str] = &[LOG_FILE];

/// Manages the cache directory (debug log)
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache manager rooted at `cache_dir` (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Where the debug log goes: `configured` if set, else `LOG_FILE` in the cache dir
    pub fn log_path(&self, configured: Option<&str>) -> PathBuf {
        configured
            .map(PathBuf::from)
            .unwrap_or_else(|| self.cache_file(LOG_FILE))
    }

    /// Remove every registered cache file, returning how many were removed
    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                match fs::remove_file(&file_path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        eprintln!("Warning: Could not remove cache file {}: {}", filename, e)
                    }
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::with_dir(dir.path().join("dataportal"));
        assert_eq!(
            cache.log_path(None),
            dir.path().join("dataportal").join(LOG_FILE)
        );
        assert_eq!(
            cache.log_path(Some("/tmp/x.log")),
            PathBuf::from("/tmp/x.log")
        );

        cache.ensure_cache_dir().unwrap();
        fs::write(cache.log_path(None), "log").unwrap();
        assert_eq!(cache.clear_all().unwrap(), 1);
        assert!(!cache.log_path(None).exists());
        assert_eq!(cache.clear_all().unwrap(), 0);
    }
}
