//! Compiler generated methods

use super::{FilterTable, MethodContext, MethodFilter, StageOutput};
use crate::class::{AccessFlags, Insn};
use std::borrow::Cow;

/// Skips bridge methods and synthetic accessors
///
/// Lambda bodies and other synthetic methods holding user code stay tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticMethodFilter;

impl MethodFilter for SyntheticMethodFilter {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool {
        let access = ctx.method.access;
        access.contains(AccessFlags::BRIDGE) || access.contains(AccessFlags::SYNTHETIC)
    }

    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        mut table: FilterTable,
    ) -> StageOutput<'a> {
        let method = ctx.method;
        if method.access.contains(AccessFlags::BRIDGE) || method.name.starts_with("access$") {
            table.method_mut(&ctx.key()).skip();
        }
        StageOutput { code, table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassFile, MethodNode};

    fn run(method: MethodNode) -> bool {
        let class = ClassFile::new("a/B").with_method(method);
        let ctx = MethodContext {
            class: &class,
            method: &class.methods[0],
        };
        if !SyntheticMethodFilter.is_applicable(&ctx) {
            return false;
        }
        let out = SyntheticMethodFilter.apply(&ctx, Cow::Borrowed(&[]), FilterTable::new());
        out.table.method(&ctx.key()).is_some_and(|s| s.is_skipped())
    }

    #[test]
    fn test_bridge_and_accessor_skipped() {
        assert!(run(MethodNode::new("compareTo", "(Ljava/lang/Object;)I")
            .with_access(AccessFlags::BRIDGE | AccessFlags::SYNTHETIC)));
        assert!(run(MethodNode::new("access$000", "(La/B;)I")
            .with_access(AccessFlags::STATIC | AccessFlags::SYNTHETIC)));
    }

    #[test]
    fn test_lambda_and_plain_kept() {
        assert!(!run(MethodNode::new("lambda$run$0", "()V")
            .with_access(AccessFlags::PRIVATE | AccessFlags::SYNTHETIC)));
        assert!(!run(MethodNode::new("run", "()V")));
    }
}
