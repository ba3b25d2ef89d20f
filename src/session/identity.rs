use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DeckError, Result};

static GLOBAL_ALLOCATOR: Lazy<IdentityAllocator> = Lazy::new(IdentityAllocator::new);

/// Hands out conversation IDs that are unique per project path.
///
/// Generating a candidate and recording it as taken happen under one lock,
/// so overlapping allocations for the same path never see the same ID.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    taken: Mutex<HashMap<PathBuf, HashSet<String>>>,
}

fn path_key(project_path: &Path) -> PathBuf {
    project_path.components().collect()
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide allocator used when callers don't bring their own.
    ///
    /// IDs stay taken until released; hosts that remove sessions call
    /// `Instance::release_identity` so the taken set does not grow unbounded.
    pub fn global() -> &'static IdentityAllocator {
        &GLOBAL_ALLOCATOR
    }

    pub fn allocate(&self, project_path: &Path) -> String {
        let mut taken = self.lock();
        let ids = taken.entry(path_key(project_path)).or_default();
        loop {
            let candidate = Uuid::new_v4().to_string();
            if ids.insert(candidate.clone()) {
                debug!(path = %project_path.display(), id = %candidate, "Allocated conversation id");
                return candidate;
            }
        }
    }

    /// Record an ID learned from outside (e.g. read back from the tool)
    pub fn record(&self, project_path: &Path, id: &str) -> Result<()> {
        let mut taken = self.lock();
        let ids = taken.entry(path_key(project_path)).or_default();
        if !ids.insert(id.to_string()) {
            return Err(DeckError::Validation(format!(
                "conversation id {id} is already used in {}",
                project_path.display()
            )));
        }
        Ok(())
    }

    /// Free an ID once the session holding it is gone
    pub fn release(&self, project_path: &Path, id: &str) -> bool {
        let mut taken = self.lock();
        let key = path_key(project_path);
        let Some(ids) = taken.get_mut(&key) else {
            return false;
        };
        let removed = ids.remove(id);
        if ids.is_empty() {
            taken.remove(&key);
        }
        removed
    }

    pub fn is_taken(&self, project_path: &Path, id: &str) -> bool {
        self.lock()
            .get(&path_key(project_path))
            .is_some_and(|ids| ids.contains(id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, HashSet<String>>> {
        self.taken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_back_to_back_allocations_differ() {
        let allocator = IdentityAllocator::new();
        let path = Path::new("/tmp/same-project");
        let first = allocator.allocate(path);
        let second = allocator.allocate(path);
        assert_ne!(first, second);
        assert!(allocator.is_taken(path, &first));
        assert!(allocator.is_taken(Path::new("/tmp/same-project/"), &second));
    }

    #[test]
    fn test_concurrent_allocations_are_unique() {
        let allocator = Arc::new(IdentityAllocator::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| allocator.allocate(Path::new("/work/repo")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate conversation id");
            }
        }
        assert_eq!(seen.len(), 16 * 50);
    }

    #[test]
    fn test_record_rejects_duplicates_per_path() {
        let allocator = IdentityAllocator::new();
        allocator.record(Path::new("/a"), "abc").unwrap();
        assert!(matches!(
            allocator.record(Path::new("/a"), "abc"),
            Err(DeckError::Validation(_))
        ));
        allocator.record(Path::new("/b"), "abc").unwrap();
    }

    #[test]
    fn test_release_frees_id() {
        let allocator = IdentityAllocator::new();
        let id = allocator.allocate(Path::new("/a"));
        assert!(allocator.release(Path::new("/a"), &id));
        assert!(!allocator.is_taken(Path::new("/a"), &id));
        assert!(!allocator.release(Path::new("/a"), &id));
        allocator.record(Path::new("/a"), &id).unwrap();
    }
}
