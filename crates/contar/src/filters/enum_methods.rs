//! Compiler generated enum members

use super::{FilterTable, MethodContext, MethodFilter, StageOutput};
use crate::class::Insn;
use std::borrow::Cow;

/// Skips `values()`, `valueOf(String)` and the no-argument constructor of enums
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumMethodsFilter;

impl MethodFilter for EnumMethodsFilter {
    fn name(&self) -> &'static str {
        "enum-methods"
    }

    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool {
        ctx.class.is_enum()
    }

    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        mut table: FilterTable,
    ) -> StageOutput<'a> {
        let class = &ctx.class.name;
        let method = ctx.method;
        let generated = match method.name.as_str() {
            "values" => method.desc == format!("()[L{class};"),
            "valueOf" => method.desc == format!("(Ljava/lang/String;)L{class};"),
            "<init>" => method.signature.as_deref() == Some("()V"),
            _ => false,
        };
        if generated {
            table.method_mut(&ctx.key()).skip();
        }
        StageOutput { code, table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{AccessFlags, ClassFile, MethodNode};

    fn color() -> ClassFile {
        let mut class = ClassFile::new("a/Color").with_access(AccessFlags::PUBLIC | AccessFlags::ENUM);
        class.super_name = Some("java/lang/Enum".to_string());
        class
            .with_method(MethodNode::new("values", "()[La/Color;"))
            .with_method(MethodNode::new("valueOf", "(Ljava/lang/String;)La/Color;"))
            .with_method(MethodNode::new("<init>", "(Ljava/lang/String;I)V").with_signature("()V"))
            .with_method(MethodNode::new("<init>", "(Ljava/lang/String;II)V"))
            .with_method(MethodNode::new("brightness", "()I"))
    }

    #[test]
    fn test_generated_members_skipped() {
        let class = color();
        let mut table = FilterTable::new();
        for method in &class.methods {
            let ctx = MethodContext {
                class: &class,
                method,
            };
            assert!(EnumMethodsFilter.is_applicable(&ctx));
            table = EnumMethodsFilter
                .apply(&ctx, Cow::Borrowed(&method.instructions), table)
                .table;
        }
        let skipped: Vec<bool> = class
            .methods
            .iter()
            .map(|m| table.method(&m.key()).is_some_and(|s| s.is_skipped()))
            .collect();
        assert_eq!(skipped, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_not_applicable_to_plain_class() {
        let class = ClassFile::new("a/Plain").with_method(MethodNode::new("values", "()[La/Plain;"));
        let ctx = MethodContext {
            class: &class,
            method: &class.methods[0],
        };
        assert!(!EnumMethodsFilter.is_applicable(&ctx));
    }
}
