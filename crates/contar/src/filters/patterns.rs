//! Include/exclude class patterns

use super::{ClassFilter, FilterTable};
use crate::class::ClassFile;
use crate::result::ContarResult;
use regex::Regex;

/// Skips classes whose dotted name is not included or is excluded
///
/// Patterns must match the whole name.
#[derive(Debug, Clone)]
pub struct ClassPatternFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ClassPatternFilter {
    /// Compile include and exclude patterns
    pub fn new(include: &[String], exclude: &[String]) -> ContarResult<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether a dotted class name passes the patterns
    #[must_use]
    pub fn accepts(&self, dotted_name: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|r| r.is_match(dotted_name));
        included && !self.exclude.iter().any(|r| r.is_match(dotted_name))
    }
}

fn compile(patterns: &[String]) -> ContarResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("^(?:{p})$")).map_err(Into::into))
        .collect()
}

impl ClassFilter for ClassPatternFilter {
    fn name(&self) -> &'static str {
        "class-patterns"
    }

    fn is_applicable(&self, _class: &ClassFile) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    fn apply(&self, class: &ClassFile, mut table: FilterTable) -> FilterTable {
        if !self.accepts(&class.dotted_name()) {
            table.skip_class();
        }
        table
    }
}
