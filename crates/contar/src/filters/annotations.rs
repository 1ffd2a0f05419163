//! Annotation based exclusion

use super::{ClassFilter, FilterTable, MethodContext, MethodFilter, StageOutput};
use crate::class::{ClassFile, Insn};
use std::borrow::Cow;

/// Skips classes carrying one of the configured annotations
#[derive(Debug, Clone, Default)]
pub struct AnnotatedClassFilter {
    annotations: Vec<String>,
}

impl AnnotatedClassFilter {
    /// Create a filter for annotation descriptors
    #[must_use]
    pub fn new(annotations: &[String]) -> Self {
        Self {
            annotations: annotations.to_vec(),
        }
    }
}

impl ClassFilter for AnnotatedClassFilter {
    fn name(&self) -> &'static str {
        "annotated-class"
    }

    fn is_applicable(&self, class: &ClassFile) -> bool {
        !self.annotations.is_empty() && !class.annotations.is_empty()
    }

    fn apply(&self, class: &ClassFile, mut table: FilterTable) -> FilterTable {
        if self.annotations.iter().any(|a| class.has_annotation(a)) {
            table.skip_class();
        }
        table
    }
}

/// Skips methods carrying one of the configured annotations
#[derive(Debug, Clone, Default)]
pub struct AnnotatedMethodFilter {
    annotations: Vec<String>,
}

impl AnnotatedMethodFilter {
    /// Create a filter for annotation descriptors
    #[must_use]
    pub fn new(annotations: &[String]) -> Self {
        Self {
            annotations: annotations.to_vec(),
        }
    }
}

impl MethodFilter for AnnotatedMethodFilter {
    fn name(&self) -> &'static str {
        "annotated-method"
    }

    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool {
        !self.annotations.is_empty() && !ctx.method.annotations.is_empty()
    }

    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        mut table: FilterTable,
    ) -> StageOutput<'a> {
        if self.annotations.iter().any(|a| ctx.method.has_annotation(a)) {
            table.method_mut(&ctx.key()).skip();
        }
        StageOutput { code, table }
    }
}
