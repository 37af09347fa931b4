use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::CoreError;

pub const GRAMMAR_EXTENSION: &str = "grm";

/// Grammar files under a library root, found by walking the tree once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryIndex {
    root: PathBuf,
    files: Vec<PathBuf>,
}

pub fn default_stdlib_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../stdlib")
}

impl LibraryIndex {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CoreError::MissingStdlib(root.to_path_buf()));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == GRAMMAR_EXTENSION) {
                let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
                files.push(relative);
            }
        }
        debug!(root = %root.display(), files = files.len(), "indexed grammar library");
        Ok(LibraryIndex {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths relative to the root, in walk order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// An exact relative path wins; otherwise the first file whose path
    /// ends with `import`.
    pub fn find(&self, import: &str) -> Option<PathBuf> {
        let wanted = Path::new(import);
        self.files
            .iter()
            .find(|file| file.as_path() == wanted)
            .or_else(|| self.files.iter().find(|file| file.ends_with(wanted)))
            .map(|file| self.root.join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn indexes_default_root() {
        let index = LibraryIndex::load(default_stdlib_root()).expect("stdlib should load");
        assert!(index.find("byte.grm").is_some());
    }

    #[test]
    fn finds_nested_files_by_suffix() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lang/en")).expect("mkdir");
        fs::write(dir.path().join("lang/en/numbers.grm"), "").expect("write");
        fs::write(dir.path().join("notes.txt"), "").expect("write");
        let index = LibraryIndex::load(dir.path()).expect("index");
        assert_eq!(index.files().len(), 1);
        assert_eq!(
            index.find("en/numbers.grm"),
            Some(dir.path().join("lang/en/numbers.grm"))
        );
        assert_eq!(index.find("lang/en/numbers.grm"), index.find("numbers.grm"));
        assert_eq!(index.find("fr/numbers.grm"), None);
    }

    #[test]
    fn missing_root_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LibraryIndex::load(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CoreError::MissingStdlib(_)));
    }
}
