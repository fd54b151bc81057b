//! In-process preview registry.
//!
//! Hands out opaque `blob:` references for staged files and counts
//! allocations and releases, so hosts and tests can check that every
//! preview is released exactly once.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fleetform_core::{PreviewProvider, StagedFile};

#[derive(Debug, Default)]
struct RegistryState {
    next: u64,
    live: HashSet<String>,
    allocated: usize,
    released: usize,
    invalid_releases: usize,
}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    state: Mutex<RegistryState>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn allocated(&self) -> usize {
        self.state().allocated
    }

    pub fn released(&self) -> usize {
        self.state().released
    }

    /// Previews allocated and not yet released.
    pub fn outstanding(&self) -> usize {
        self.state().live.len()
    }

    /// Releases of references that were unknown or already released.
    pub fn invalid_releases(&self) -> usize {
        self.state().invalid_releases
    }

    pub fn is_live(&self, reference: &str) -> bool {
        self.state().live.contains(reference)
    }
}

impl PreviewProvider for PreviewRegistry {
    fn allocate(&self, file: &StagedFile) -> String {
        let mut state = self.state();
        state.next += 1;
        let reference = format!("blob:fleetform/{}", state.next);
        state.live.insert(reference.clone());
        state.allocated += 1;
        tracing::debug!(reference = %reference, filename = %file.filename, "Allocated preview");
        reference
    }

    fn release(&self, reference: &str) {
        let mut state = self.state();
        if state.live.remove(reference) {
            state.released += 1;
            tracing::debug!(reference = %reference, "Released preview");
        } else {
            state.invalid_releases += 1;
            tracing::warn!(reference = %reference, "Release of unknown or already released preview");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release_counts() {
        let registry = PreviewRegistry::new();
        let file = StagedFile::new("a.png", "image/png", vec![1u8]);

        let first = registry.allocate(&file);
        let second = registry.allocate(&file);
        assert_ne!(first, second);
        assert_eq!(registry.outstanding(), 2);

        registry.release(&first);
        assert!(!registry.is_live(&first));
        assert!(registry.is_live(&second));
        assert_eq!(registry.released(), 1);
        assert_eq!(registry.outstanding(), 1);
    }

    #[test]
    fn test_double_release_is_counted_not_applied() {
        let registry = PreviewRegistry::new();
        let file = StagedFile::new("a.png", "image/png", vec![1u8]);
        let reference = registry.allocate(&file);

        registry.release(&reference);
        registry.release(&reference);
        assert_eq!(registry.released(), 1);
        assert_eq!(registry.invalid_releases(), 1);
    }
}
