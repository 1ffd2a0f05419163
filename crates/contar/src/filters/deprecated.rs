//! Kotlin deprecated methods
//!
//! A method annotated `@Deprecated(level = ERROR)` or `HIDDEN` can never be
//! called from source, so its body is not tracked. The synthetic `$default`
//! variant generated for its default arguments goes with it. The class stage
//! collects deprecated names before any method is looked at, so the outcome
//! does not depend on declaration order.

use super::{ClassFilter, FilterTable, MethodContext, MethodFilter, StageOutput, KOTLIN_METADATA};
use crate::class::{AnnotationValue, ClassFile, Insn, MethodNode};
use std::borrow::Cow;

const DEPRECATED: &str = "Lkotlin/Deprecated;";
const DEPRECATION_LEVEL: &str = "Lkotlin/DeprecationLevel;";
const DEFAULT_SUFFIX: &str = "$default";

/// Ignores error/hidden deprecated Kotlin methods and their `$default` variants
#[derive(Debug, Clone, Copy, Default)]
pub struct DeprecatedMethodFilter;

fn is_hidden_deprecated(method: &MethodNode) -> bool {
    method
        .annotations
        .iter()
        .filter(|a| a.desc == DEPRECATED)
        .flat_map(|a| a.values.iter())
        .any(|(name, value)| {
            name == "level"
                && matches!(
                    value,
                    AnnotationValue::Enum { desc, value }
                        if desc == DEPRECATION_LEVEL && (value == "ERROR" || value == "HIDDEN")
                )
        })
}

impl ClassFilter for DeprecatedMethodFilter {
    fn name(&self) -> &'static str {
        "kotlin-deprecated"
    }

    fn is_applicable(&self, class: &ClassFile) -> bool {
        class.has_annotation(KOTLIN_METADATA)
    }

    fn apply(&self, class: &ClassFile, mut table: FilterTable) -> FilterTable {
        for method in class.methods.iter().filter(|m| is_hidden_deprecated(m)) {
            table.add_deprecated_method(&method.name);
        }
        table
    }
}

impl MethodFilter for DeprecatedMethodFilter {
    fn name(&self) -> &'static str {
        "kotlin-deprecated"
    }

    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool {
        ctx.is_kotlin_class()
    }

    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        mut table: FilterTable,
    ) -> StageOutput<'a> {
        let default_of_deprecated = ctx
            .method
            .name
            .strip_suffix(DEFAULT_SUFFIX)
            .is_some_and(|base| table.deprecated_methods().contains(base));
        if is_hidden_deprecated(ctx.method) || default_of_deprecated {
            table.method_mut(&ctx.key()).ignore_region(0..code.len());
        }
        StageOutput { code, table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{AccessFlags, Annotation, JumpCond, ReturnKind};
    use crate::filters::FilterChain;

    fn deprecated(level: &str) -> Annotation {
        Annotation::marker(DEPRECATED).with_enum("level", DEPRECATION_LEVEL, level)
    }

    fn body() -> Vec<Insn> {
        use crate::class::Label;
        vec![
            Insn::Label(Label::new(0)),
            Insn::Line {
                line: 3,
                start: Label::new(0),
            },
            Insn::Const(1),
            Insn::Jump {
                cond: JumpCond::Always,
                target: Label::new(1),
            },
            Insn::Label(Label::new(1)),
            Insn::Return(ReturnKind::Void),
        ]
    }

    fn kotlin_class(methods: Vec<MethodNode>) -> ClassFile {
        methods.into_iter().fold(
            ClassFile::new("k/Api").with_annotation(Annotation::marker(KOTLIN_METADATA)),
            ClassFile::with_method,
        )
    }

    fn chain() -> FilterChain {
        FilterChain::new()
            .with_class_filter(DeprecatedMethodFilter)
            .with_method_filter(DeprecatedMethodFilter)
    }

    #[test]
    fn test_default_variant_ignored_regardless_of_order() {
        let old = MethodNode::new("old", "(I)V")
            .with_annotation(deprecated("HIDDEN"))
            .with_code(body());
        let default = MethodNode::new("old$default", "(Lk/Api;IILjava/lang/Object;)V")
            .with_access(AccessFlags::STATIC | AccessFlags::SYNTHETIC)
            .with_code(body());

        for class in [
            kotlin_class(vec![old.clone(), default.clone()]),
            kotlin_class(vec![default, old]),
        ] {
            let filtered = chain().run(&class, FilterTable::new());
            for method in &class.methods {
                assert!(
                    filtered.table.tracked_lines(&method.key(), &method.instructions).is_empty(),
                    "{} should not be tracked",
                    method.name
                );
            }
        }
    }

    #[test]
    fn test_warning_level_is_tracked() {
        let method = MethodNode::new("soft", "()V")
            .with_annotation(deprecated("WARNING"))
            .with_code(body());
        let class = kotlin_class(vec![method]);
        let filtered = chain().run(&class, FilterTable::new());
        let m = &class.methods[0];
        assert_eq!(filtered.table.tracked_lines(&m.key(), &m.instructions).len(), 1);
    }

    #[test]
    fn test_java_classes_untouched() {
        let method = MethodNode::new("old", "()V")
            .with_annotation(deprecated("ERROR"))
            .with_code(body());
        let class = ClassFile::new("j/Api").with_method(method);
        let filtered = chain().run(&class, FilterTable::new());
        assert!(filtered.table.deprecated_methods().is_empty());
        let m = &class.methods[0];
        assert_eq!(filtered.table.tracked_lines(&m.key(), &m.instructions).len(), 1);
    }
}
