//! Detects file load cycles on the current thread.
//!
//! Each thread keeps its own stack of files being loaded. Loads on other
//! threads are not seen, so two threads may load the same file at once.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::ModelError;

thread_local! {
    static FILE_STACK: RefCell<Vec<PathBuf>> = const { RefCell::new(Vec::new()) };
}

/// Marks a file as being loaded until dropped.
#[must_use = "the file is unmarked as soon as the guard is dropped"]
pub struct CircularityGuard {
    path: PathBuf,
    _not_send: PhantomData<*const ()>,
}

impl CircularityGuard {
    /// Pushes the canonical form of `path`; fails if it is already being
    /// loaded further up this thread's call stack.
    pub fn enter(path: &Path) -> Result<CircularityGuard, ModelError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ModelError::InvalidFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        FILE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&canonical) {
                return Err(ModelError::Circularity(canonical.clone()));
            }
            stack.push(canonical.clone());
            Ok(())
        })?;
        Ok(CircularityGuard {
            path: canonical,
            _not_send: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of files currently being loaded on this thread.
    pub fn depth() -> usize {
        FILE_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for CircularityGuard {
    fn drop(&mut self) {
        FILE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|p| p == &self.path) {
                stack.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn nested_entry_of_same_file_fails_and_unwinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{}").unwrap();

        {
            let _outer = CircularityGuard::enter(&file).unwrap();
            assert_eq!(CircularityGuard::depth(), 1);
            let err = CircularityGuard::enter(&file).err().expect("cycle");
            assert!(matches!(err, ModelError::Circularity(_)));
            assert_eq!(CircularityGuard::depth(), 1);
        }
        assert_eq!(CircularityGuard::depth(), 0);

        let again = CircularityGuard::enter(&file).unwrap();
        drop(again);
        assert_eq!(CircularityGuard::depth(), 0);
    }

    #[test]
    fn differently_spelled_paths_are_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{}").unwrap();

        let _outer = CircularityGuard::enter(&file).unwrap();
        let indirect = dir.path().join("sub").join("..").join("a.json");
        assert!(CircularityGuard::enter(&indirect).is_err());
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = CircularityGuard::enter(Path::new("/no/such/file.json"))
            .err()
            .expect("missing");
        assert!(err.is_configuration());
    }

    #[test]
    fn threads_have_independent_stacks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("shared.json");
        fs::write(&file, "{}").unwrap();

        let _held = CircularityGuard::enter(&file).unwrap();
        let other = file.clone();
        std::thread::spawn(move || {
            let guard = CircularityGuard::enter(&other);
            assert!(guard.is_ok());
        })
        .join()
        .unwrap();
    }
}
