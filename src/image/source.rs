//! Application source tree scanning
//!
//! Walks the source directory in a stable order and hashes relative paths,
//! permission bits and file contents, so the source layer's digest is a
//! pure function of what ends up in the image.

use crate::error::{BerthError, BerthResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Names never copied into the image
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "target",
    "node_modules",
    ".DS_Store",
];

/// A scanned source tree
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    /// Relative paths, sorted
    files: Vec<PathBuf>,
    digest: String,
}

impl SourceTree {
    /// Scan `root`, skipping [`DEFAULT_EXCLUDES`] and any extra names
    pub fn scan(root: &Path, extra_excludes: &[String]) -> BerthResult<Self> {
        if !root.is_dir() {
            return Err(BerthError::PathNotFound(root.to_path_buf()));
        }

        let excludes: HashSet<&str> = DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(extra_excludes.iter().map(String::as_str))
            .collect();

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| excludes.contains(name))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                BerthError::io(
                    format!("walking source tree at {}", path.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;

            if entry.file_type().is_symlink() {
                debug!("Skipping symlink {}", entry.path().display());
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| BerthError::Internal("source entry outside root".to_string()))?
                .to_path_buf();
            files.push(rel);
        }

        let digest = hash_files(root, &files)?;
        debug!(
            "Scanned {} source files under {} ({})",
            files.len(),
            root.display(),
            &digest[..12]
        );

        Ok(Self {
            root: root.to_path_buf(),
            files,
            digest,
        })
    }

    /// Source root on the host
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative file paths in copy order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// SHA256 over every relative path, its mode and its contents
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Copy every scanned file into `dest`, preserving relative paths.
    ///
    /// The staged copy is hashed again and must match the scanned digest,
    /// otherwise the image would not match its content-derived tag.
    pub async fn stage(&self, dest: &Path) -> BerthResult<()> {
        for rel in &self.files {
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    BerthError::io(format!("creating {}", parent.display()), e)
                })?;
            }
            tokio::fs::copy(self.root.join(rel), &target)
                .await
                .map_err(|e| BerthError::io(format!("staging {}", rel.display()), e))?;
        }

        let staged = hash_files(dest, &self.files)?;
        if staged != self.digest {
            return Err(BerthError::SourceChanged(self.root.clone()));
        }
        Ok(())
    }
}

fn hash_files(root: &Path, files: &[PathBuf]) -> BerthResult<String> {
    let mut hasher = Sha256::new();

    for rel in files {
        let path = root.join(rel);
        let metadata = std::fs::metadata(&path)
            .map_err(|e| BerthError::io(format!("reading {}", rel.display()), e))?;
        let contents = std::fs::read(&path)
            .map_err(|e| BerthError::io(format!("reading {}", rel.display()), e))?;

        // Forward slashes so the digest does not depend on the host OS
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        hasher.update(rel_str.as_bytes());
        hasher.update([0u8]);
        hasher.update(file_mode(&metadata).to_le_bytes());
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Permission bits copied into the image
#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    u32::from(metadata.permissions().readonly())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn scan_skips_excluded_dirs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.py", "app = None");
        write(temp.path(), "pkg/util.py", "");
        write(temp.path(), "__pycache__/app.cpython-311.pyc", "junk");
        write(temp.path(), ".git/HEAD", "ref");
        write(temp.path(), "secrets/key", "x");

        let tree = SourceTree::scan(temp.path(), &["secrets".to_string()]).unwrap();
        let files: Vec<_> = tree.files().iter().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
        assert_eq!(files, vec!["app.py", "pkg/util.py"]);
    }

    #[test]
    fn digest_tracks_content_and_paths() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.py", "v1");
        let first = SourceTree::scan(temp.path(), &[]).unwrap();
        let again = SourceTree::scan(temp.path(), &[]).unwrap();
        assert_eq!(first.digest(), again.digest());

        write(temp.path(), "app.py", "v2");
        let edited = SourceTree::scan(temp.path(), &[]).unwrap();
        assert_ne!(first.digest(), edited.digest());

        std::fs::rename(temp.path().join("app.py"), temp.path().join("main.py")).unwrap();
        let renamed = SourceTree::scan(temp.path(), &[]).unwrap();
        assert_ne!(edited.digest(), renamed.digest());
    }

    #[test]
    fn scan_missing_root_errors() {
        let temp = TempDir::new().unwrap();
        let result = SourceTree::scan(&temp.path().join("nope"), &[]);
        assert!(matches!(result, Err(BerthError::PathNotFound(_))));
    }

    #[tokio::test]
    async fn stage_copies_tree() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "app.py", "app");
        write(src.path(), "api/routes.py", "routes");

        let tree = SourceTree::scan(src.path(), &[]).unwrap();
        tree.stage(dest.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.path().join("api/routes.py")).unwrap(),
            "routes"
        );
        assert!(dest.path().join("app.py").exists());
    }

    #[cfg(unix)]
    #[test]
    fn digest_tracks_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        write(temp.path(), "run.sh", "#!/bin/sh\n");
        let path = temp.path().join("run.sh");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let before = SourceTree::scan(temp.path(), &[]).unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let after = SourceTree::scan(temp.path(), &[]).unwrap();
        assert_ne!(before.digest(), after.digest());
    }

    #[tokio::test]
    async fn stage_rejects_edit_after_scan() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "app.py", "v1");

        let tree = SourceTree::scan(src.path(), &[]).unwrap();
        write(src.path(), "app.py", "v2");

        let err = tree.stage(dest.path()).await.unwrap_err();
        assert!(matches!(err, BerthError::SourceChanged(_)));
    }
}
