//! Per-class coverage container

use super::{HitId, LineData};
use crate::result::{ContarError, ContarResult};
use crate::runtime::HitsArray;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Lines, method grouping and hit storage of one class
#[derive(Debug, Clone)]
pub struct ClassData {
    name: String,
    lines: BTreeMap<u32, LineData>,
    methods: BTreeMap<String, BTreeSet<u32>>,
    next_id: u32,
    ids_finalized: bool,
    hits: Option<Arc<HitsArray>>,
}

impl ClassData {
    /// Create an empty container for the dotted class name
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: BTreeMap::new(),
            methods: BTreeMap::new(),
            next_id: 0,
            ids_finalized: false,
            hits: None,
        }
    }

    /// Dotted class name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the line record, creating it for `method_signature` if absent
    ///
    /// An existing record is reused even when it belongs to another method.
    pub fn get_or_create_line(&mut self, line: u32, method_signature: &str) -> &mut LineData {
        self.lines
            .entry(line)
            .or_insert_with(|| LineData::new(line, method_signature))
    }

    /// Line record for a line number
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&LineData> {
        self.lines.get(&line)
    }

    pub(crate) fn line_mut(&mut self, line: u32) -> Option<&mut LineData> {
        self.lines.get_mut(&line)
    }

    /// All line records in line order
    pub fn lines(&self) -> impl Iterator<Item = &LineData> {
        self.lines.values()
    }

    /// Number of line records
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Group the line under its own method signature
    pub fn register_method_signature(&mut self, line: u32) {
        if let Some(data) = self.lines.get(&line) {
            let _ = self
                .methods
                .entry(data.method_signature().to_string())
                .or_default()
                .insert(line);
        }
    }

    /// Registered method signatures in sorted order
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Line records grouped under a method signature
    pub fn method_lines<'a>(&'a self, signature: &str) -> impl Iterator<Item = &'a LineData> + 'a {
        self.methods
            .get(signature)
            .into_iter()
            .flatten()
            .filter_map(|line| self.lines.get(line))
    }

    /// Whether identifiers were already allocated for this class
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        self.next_id > 0 || self.ids_finalized
    }

    /// Allocate the next dense identifier
    pub(crate) fn allocate_id(&mut self) -> ContarResult<HitId> {
        if self.ids_finalized {
            return Err(ContarError::AlreadyInstrumented {
                class: self.name.clone(),
            });
        }
        let id = HitId::new(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    /// Close identifier allocation; returns the number of ids handed out
    pub(crate) fn finalize_ids(&mut self) -> usize {
        self.ids_finalized = true;
        self.next_id as usize
    }

    /// Number of ids allocated so far
    #[must_use]
    pub fn id_count(&self) -> usize {
        self.next_id as usize
    }

    /// Allocate the hits array once identifier allocation is complete
    pub fn create_hits_mask(&mut self, size: usize) -> ContarResult<Arc<HitsArray>> {
        if !self.ids_finalized {
            return Err(ContarError::IdsNotFinalized {
                class: self.name.clone(),
            });
        }
        let allocated = self.id_count();
        if size < allocated {
            return Err(ContarError::HitIdOutOfRange {
                id: i32::try_from(allocated - 1).unwrap_or(i32::MAX),
                size,
            });
        }
        if size > allocated {
            return Err(ContarError::invalid(format!(
                "hits array of {size} slots for {allocated} ids in {}",
                self.name
            )));
        }
        let hits = Arc::new(HitsArray::new(size));
        self.hits = Some(Arc::clone(&hits));
        Ok(hits)
    }

    /// The hits array, once created
    #[must_use]
    pub fn hits(&self) -> Option<&Arc<HitsArray>> {
        self.hits.as_ref()
    }

    /// Copy runtime counters into the line records
    pub fn apply_hits(&mut self) {
        if let Some(hits) = &self.hits {
            for line in self.lines.values_mut() {
                line.apply_hits(hits);
            }
        }
    }
}
