//! Process-wide class registry
//!
//! One [`ProjectData`] is created per instrumented process and handed by
//! reference to the class-load callback and the shutdown hook. Classes may be
//! registered from several loading threads at once; exactly one
//! [`ClassData`] per name ever becomes visible.

use super::ClassData;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Shared handle to one class's coverage data
pub type ClassHandle = Arc<Mutex<ClassData>>;

/// Lock a class handle, recovering the data if a holder panicked
pub fn lock_class(handle: &ClassHandle) -> MutexGuard<'_, ClassData> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of all classes by dotted name
#[derive(Debug, Default)]
pub struct ProjectData {
    classes: RwLock<HashMap<String, ClassHandle>>,
}

impl ProjectData {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a class, inserting an empty record if absent
    pub fn get_or_create_class_data(&self, name: &str) -> ClassHandle {
        if let Some(existing) = self.class_data(name) {
            return existing;
        }
        let mut classes = self
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            classes
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ClassData::new(name)))),
        )
    }

    /// Look up a class
    #[must_use]
    pub fn class_data(&self, name: &str) -> Option<ClassHandle> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered class names in sorted order
    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of registered classes
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Remove a class record that never received lines or ids
    ///
    /// Returns whether the record was removed.
    pub(crate) fn discard_if_empty(&self, name: &str) -> bool {
        let mut classes = self
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let empty = classes.get(name).is_some_and(|handle| {
            let data = lock_class(handle);
            data.line_count() == 0 && !data.is_instrumented()
        });
        if empty {
            let _ = classes.remove(name);
        }
        empty
    }

    /// Copy runtime counters of every class into its line records
    pub fn apply_hits(&self) {
        let handles: Vec<ClassHandle> = self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handle in handles {
            lock_class(&handle).apply_hits();
        }
    }

    /// Run `f` with read access to a class
    pub fn with_class<R>(&self, name: &str, f: impl FnOnce(&ClassData) -> R) -> Option<R> {
        self.class_data(name).map(|handle| f(&lock_class(&handle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let project = ProjectData::new();
        let a = project.get_or_create_class_data("a.B");
        let b = project.get_or_create_class_data("a.B");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(project.class_count(), 1);
        assert!(project.class_data("a.C").is_none());
    }

    #[test]
    fn test_class_names_sorted() {
        let project = ProjectData::new();
        for name in ["z.Z", "a.A", "m.M"] {
            let _ = project.get_or_create_class_data(name);
        }
        assert_eq!(project.class_names(), vec!["a.A", "m.M", "z.Z"]);
    }

    #[test]
    fn test_concurrent_creation_yields_one_instance() {
        let project = Arc::new(ProjectData::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let project = Arc::clone(&project);
                thread::spawn(move || project.get_or_create_class_data("race.Target"))
            })
            .collect();
        let results: Vec<ClassHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(project.class_count(), 1);
    }

    #[test]
    fn test_discard_only_empty_records() {
        let project = ProjectData::new();
        let _ = project.get_or_create_class_data("a.Empty");
        let used = project.get_or_create_class_data("a.Used");
        let _ = lock_class(&used).get_or_create_line(3, "m()V");
        assert!(project.discard_if_empty("a.Empty"));
        assert!(!project.discard_if_empty("a.Used"));
        assert!(!project.discard_if_empty("a.Missing"));
        assert_eq!(project.class_names(), vec!["a.Used"]);
    }

    #[test]
    fn test_with_class() {
        let project = ProjectData::new();
        let handle = project.get_or_create_class_data("a.B");
        let _ = lock_class(&handle).get_or_create_line(4, "m()V");
        assert_eq!(project.with_class("a.B", ClassData::line_count), Some(1));
        assert_eq!(project.with_class("x.Y", ClassData::line_count), None);
    }
}
