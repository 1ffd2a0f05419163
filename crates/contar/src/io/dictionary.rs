//! String deduplication for the binary format
//!
//! Every distinct string is stored once in the file header and referenced by
//! index everywhere else. The writer interns all strings before it emits a
//! single reference, so a reference always points at an entry that is
//! already fully defined when the reader reaches it.

use crate::result::{ContarError, ContarResult};
use std::collections::HashMap;

/// Writer side: assigns sequential ids to strings in first-seen order
#[derive(Debug, Default)]
pub struct Dictionary {
    strings: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Dictionary {
    /// Create an empty dictionary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `s`, adding it if unseen
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(id) = self.ids.get(s) {
            return *id;
        }
        let id = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        self.strings.push(s.to_string());
        let _ = self.ids.insert(s.to_string(), id);
        id
    }

    /// Id of an interned string
    pub fn id(&self, s: &str) -> ContarResult<u32> {
        self.ids
            .get(s)
            .copied()
            .ok_or_else(|| ContarError::invalid(format!("string {s:?} was not interned")))
    }

    /// Strings in id order
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the dictionary is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Reader side: resolves references against the decoded header
#[derive(Debug, Default)]
pub struct DictionaryTable {
    strings: Vec<String>,
}

impl DictionaryTable {
    /// Wrap decoded entries
    #[must_use]
    pub fn new(strings: Vec<String>) -> Self {
        Self { strings }
    }

    /// Resolve a reference
    pub fn resolve(&self, id: u32, context: &str) -> ContarResult<&str> {
        self.strings
            .get(id as usize)
            .map(String::as_str)
            .ok_or_else(|| {
                ContarError::invalid(format!(
                    "{context} references entry {id} of a {}-entry dictionary",
                    self.strings.len()
                ))
            })
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
