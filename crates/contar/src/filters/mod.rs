//! Filter chain
//!
//! Filters decide which parts of a class are tracked. They run as an ordered
//! pipeline of pure stages: class stages see the whole [`ClassFile`], method
//! stages see one method's instruction stream. Every stage takes the
//! [`FilterTable`] produced so far and returns an updated one, so ordering
//! dependencies (deprecated names collected before `$default` variants are
//! judged) are explicit and no state is shared behind the stages' backs.
//!
//! ```text
//! ClassFile ─► class stages ─► FilterTable ─► method stages (per method) ─► FilteredClass
//! ```

mod annotations;
mod assertions;
mod closing_braces;
mod deprecated;
mod enum_methods;
mod patterns;
mod synthetic;

pub use annotations::{AnnotatedClassFilter, AnnotatedMethodFilter};
pub use assertions::AssertionBranchFilter;
pub use closing_braces::ClosingBracesFilter;
pub use deprecated::DeprecatedMethodFilter;
pub use enum_methods::EnumMethodsFilter;
pub use patterns::ClassPatternFilter;
pub use synthetic::SyntheticMethodFilter;

use crate::class::{ClassFile, Insn, MethodKey, MethodNode};
use crate::config::InstrumentationConfig;
use crate::result::ContarResult;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::Range;

/// Annotation marking classes compiled from Kotlin
pub const KOTLIN_METADATA: &str = "Lkotlin/Metadata;";

/// Filter results for one method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilterState {
    skip: bool,
    ignored_regions: Vec<Range<usize>>,
    removed_lines: BTreeSet<u32>,
}

impl MethodFilterState {
    /// Leave the method completely uninstrumented
    pub fn skip(&mut self) {
        self.skip = true;
    }

    /// Whether the method is left uninstrumented
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Exclude the instruction slots in `range` from tracking
    pub fn ignore_region(&mut self, range: Range<usize>) {
        if range.is_empty() || self.ignored_regions.iter().any(|r| r.start <= range.start && range.end <= r.end) {
            return;
        }
        self.ignored_regions.push(range);
    }

    /// Whether the slot at `index` lies in an ignored region
    #[must_use]
    pub fn is_ignored(&self, index: usize) -> bool {
        self.ignored_regions.iter().any(|r| r.contains(&index))
    }

    /// Ignored regions in the order they were added
    #[must_use]
    pub fn ignored_regions(&self) -> &[Range<usize>] {
        &self.ignored_regions
    }

    /// Stop tracking a line of this method
    pub fn remove_line(&mut self, line: u32) {
        let _ = self.removed_lines.insert(line);
    }

    /// Whether a line was removed from this method
    #[must_use]
    pub fn is_line_removed(&self, line: u32) -> bool {
        self.removed_lines.contains(&line)
    }

    /// Lines removed from this method
    #[must_use]
    pub fn removed_lines(&self) -> &BTreeSet<u32> {
        &self.removed_lines
    }
}

/// Side table accumulated by the filter stages of one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterTable {
    skip_class: bool,
    deprecated_methods: BTreeSet<String>,
    class_lines: BTreeSet<u32>,
    methods: BTreeMap<MethodKey, MethodFilterState>,
}

impl FilterTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave the whole class uninstrumented
    pub fn skip_class(&mut self) {
        self.skip_class = true;
    }

    /// Whether the whole class is left uninstrumented
    #[must_use]
    pub fn is_class_skipped(&self) -> bool {
        self.skip_class
    }

    /// Record a deprecated method by its original name
    pub fn add_deprecated_method(&mut self, name: &str) {
        let _ = self.deprecated_methods.insert(name.to_string());
    }

    /// Deprecated method names
    #[must_use]
    pub fn deprecated_methods(&self) -> &BTreeSet<String> {
        &self.deprecated_methods
    }

    /// Record lines tracked by a method that finished filtering
    pub fn record_class_lines(&mut self, lines: impl IntoIterator<Item = u32>) {
        self.class_lines.extend(lines);
    }

    /// Whether a method filtered earlier tracks `line`
    #[must_use]
    pub fn is_class_line(&self, line: u32) -> bool {
        self.class_lines.contains(&line)
    }

    /// Filter state of a method, if any stage touched it
    #[must_use]
    pub fn method(&self, key: &MethodKey) -> Option<&MethodFilterState> {
        self.methods.get(key)
    }

    /// Mutable filter state of a method
    pub fn method_mut(&mut self, key: &MethodKey) -> &mut MethodFilterState {
        self.methods.entry(key.clone()).or_default()
    }

    /// Whether the slot `index` of a method's body is tracked
    #[must_use]
    pub fn is_slot_tracked(&self, key: &MethodKey, index: usize) -> bool {
        self.method(key).map_or(true, |state| !state.is_skipped() && !state.is_ignored(index))
    }

    /// Lines of `code` that remain tracked after filtering
    #[must_use]
    pub fn tracked_lines(&self, key: &MethodKey, code: &[Insn]) -> BTreeSet<u32> {
        let state = self.method(key);
        if state.is_some_and(MethodFilterState::is_skipped) {
            return BTreeSet::new();
        }
        code.iter()
            .enumerate()
            .filter_map(|(index, insn)| match insn {
                Insn::Line { line, .. } => Some((index, *line)),
                _ => None,
            })
            .filter(|(index, line)| {
                state.map_or(true, |s| !s.is_ignored(*index) && !s.is_line_removed(*line))
            })
            .map(|(_, line)| line)
            .collect()
    }
}

/// Facts a method stage may consult
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    /// Enclosing class
    pub class: &'a ClassFile,
    /// Method being filtered
    pub method: &'a MethodNode,
}

impl MethodContext<'_> {
    /// Key of the method
    #[must_use]
    pub fn key(&self) -> MethodKey {
        self.method.key()
    }

    /// Whether the enclosing class was compiled from Kotlin
    #[must_use]
    pub fn is_kotlin_class(&self) -> bool {
        self.class.has_annotation(KOTLIN_METADATA)
    }
}

/// Output of one method stage
#[derive(Debug)]
pub struct StageOutput<'a> {
    /// Instruction stream for the next stage
    pub code: Cow<'a, [Insn]>,
    /// Updated side table
    pub table: FilterTable,
}

/// A stage that looks at a whole class
pub trait ClassFilter: Debug + Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Cheap precondition; the stage is skipped when false
    fn is_applicable(&self, class: &ClassFile) -> bool;

    /// Run the stage
    fn apply(&self, class: &ClassFile, table: FilterTable) -> FilterTable;
}

/// A stage that looks at one method
///
/// A stage that rewrites the stream must keep slot indices stable (replace,
/// never insert or delete) so regions recorded by earlier stages stay valid.
pub trait MethodFilter: Debug + Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Cheap precondition; the stage is skipped when false
    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool;

    /// Run the stage
    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        table: FilterTable,
    ) -> StageOutput<'a>;
}

/// A class after the filter chain ran
#[derive(Debug)]
pub struct FilteredClass<'a> {
    /// Final instruction stream of every method, parallel to `class.methods`
    pub code: Vec<Cow<'a, [Insn]>>,
    /// Accumulated side table
    pub table: FilterTable,
}

/// Ordered filter stages
#[derive(Debug, Default)]
pub struct FilterChain {
    class_filters: Vec<Box<dyn ClassFilter>>,
    method_filters: Vec<Box<dyn MethodFilter>>,
}

impl FilterChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain for a configuration
    pub fn standard(config: &InstrumentationConfig) -> ContarResult<Self> {
        Ok(Self::new()
            .with_class_filter(ClassPatternFilter::new(
                &config.include_patterns,
                &config.exclude_patterns,
            )?)
            .with_class_filter(AnnotatedClassFilter::new(&config.exclude_annotations))
            .with_class_filter(DeprecatedMethodFilter)
            .with_method_filter(DeprecatedMethodFilter)
            .with_method_filter(SyntheticMethodFilter)
            .with_method_filter(EnumMethodsFilter)
            .with_method_filter(AnnotatedMethodFilter::new(&config.exclude_annotations))
            .with_method_filter(AssertionBranchFilter)
            .with_method_filter(ClosingBracesFilter))
    }

    /// Append a class stage
    #[must_use]
    pub fn with_class_filter(mut self, filter: impl ClassFilter + 'static) -> Self {
        self.class_filters.push(Box::new(filter));
        self
    }

    /// Append a method stage
    #[must_use]
    pub fn with_method_filter(mut self, filter: impl MethodFilter + 'static) -> Self {
        self.method_filters.push(Box::new(filter));
        self
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.class_filters.len() + self.method_filters.len()
    }

    /// Whether the chain has no stages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every applicable stage over `class`, starting from `seed`
    pub fn run<'a>(&self, class: &'a ClassFile, seed: FilterTable) -> FilteredClass<'a> {
        let mut table = seed;
        for filter in &self.class_filters {
            if filter.is_applicable(class) {
                table = filter.apply(class, table);
            }
        }

        let mut code = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let ctx = MethodContext { class, method };
            let mut stream: Cow<'a, [Insn]> = Cow::Borrowed(&method.instructions);
            if !table.is_class_skipped() {
                for filter in &self.method_filters {
                    if filter.is_applicable(&ctx) {
                        let out = filter.apply(&ctx, stream, table);
                        stream = out.code;
                        table = out.table;
                    }
                }
                let lines = table.tracked_lines(&ctx.key(), &stream);
                table.record_class_lines(lines);
            }
            code.push(stream);
        }
        FilteredClass { code, table }
    }
}
