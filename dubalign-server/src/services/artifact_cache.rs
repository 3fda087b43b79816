//! Temp-dir artifact cache
//!
//! Intermediate files (analysis WAVs, preview clips, scrub frames) are
//! keyed by a digest of the inputs that produced them, so repeated
//! requests for the same source reuse the file on disk instead of
//! re-running the external tool.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Handle to the service's scratch directory
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Open (creating if needed) the cache rooted at `root`
    pub fn open(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for an artifact derived from `inputs`, with the given
    /// filename prefix and extension
    ///
    /// The same inputs always map to the same path; the file may or may
    /// not exist yet.
    pub fn keyed_path(&self, prefix: &str, inputs: &[&str], extension: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        for input in inputs {
            hasher.update(input.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let key: String = digest[..6].iter().map(|b| format!("{:02x}", b)).collect();
        self.root.join(format!("{}_{}.{}", prefix, key, extension))
    }

    /// Remove every artifact in the cache
    pub fn clear(&self) -> std::io::Result<()> {
        let mut removed = 0usize;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        debug!(removed, root = %self.root.display(), "Cleared artifact cache");
        Ok(())
    }
}
