//! `assert` statement branches
//!
//! `javac` compiles `assert cond` into a read of the synthetic
//! `$assertionsDisabled` flag followed by a conditional jump over the check.
//! That jump is a compiler artifact, not a user branch.

use super::{FilterTable, MethodContext, MethodFilter, StageOutput};
use crate::class::{FieldOp, Insn};
use std::borrow::Cow;

const ASSERTIONS_DISABLED: &str = "$assertionsDisabled";

/// Ignores the jump guarding each `assert` statement
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionBranchFilter;

fn is_assertion_flag(insn: &Insn) -> bool {
    matches!(
        insn,
        Insn::Field { op: FieldOp::GetStatic, name, desc, .. }
            if name == ASSERTIONS_DISABLED && desc == "Z"
    )
}

impl MethodFilter for AssertionBranchFilter {
    fn name(&self) -> &'static str {
        "assertions"
    }

    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool {
        ctx.method.instructions.iter().any(is_assertion_flag)
    }

    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        mut table: FilterTable,
    ) -> StageOutput<'a> {
        let key = ctx.key();
        for (start, _) in code.iter().enumerate().filter(|(_, i)| is_assertion_flag(i)) {
            let guard = code[start + 1..]
                .iter()
                .position(|i| !i.is_pseudo())
                .map(|offset| start + 1 + offset);
            if let Some(end) = guard {
                if matches!(&code[end], Insn::Jump { cond, .. } if cond.is_conditional()) {
                    table.method_mut(&key).ignore_region(start..end + 1);
                }
            }
        }
        StageOutput { code, table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassFile, JumpCond, Label, MethodNode, ReturnKind};

    #[test]
    fn test_guard_jump_ignored() {
        let code = vec![
            Insn::Label(Label::new(0)),
            Insn::Line {
                line: 7,
                start: Label::new(0),
            },
            Insn::Field {
                op: FieldOp::GetStatic,
                owner: "a/B".to_string(),
                name: ASSERTIONS_DISABLED.to_string(),
                desc: "Z".to_string(),
            },
            Insn::Jump {
                cond: JumpCond::IfNe,
                target: Label::new(1),
            },
            Insn::Load(0),
            Insn::Pop,
            Insn::Label(Label::new(1)),
            Insn::Return(ReturnKind::Void),
        ];
        let class = ClassFile::new("a/B").with_method(MethodNode::new("check", "()V").with_code(code));
        let ctx = MethodContext {
            class: &class,
            method: &class.methods[0],
        };
        assert!(AssertionBranchFilter.is_applicable(&ctx));
        let out = AssertionBranchFilter.apply(
            &ctx,
            Cow::Borrowed(&class.methods[0].instructions),
            FilterTable::new(),
        );
        let state = out.table.method(&ctx.key()).unwrap();
        assert_eq!(state.ignored_regions(), &[2..4]);
        assert!(!state.is_ignored(1));
        assert!(state.is_ignored(3));
    }

    #[test]
    fn test_not_applicable_without_flag() {
        let class = ClassFile::new("a/B").with_method(
            MethodNode::new("m", "()V").with_code(vec![Insn::Return(ReturnKind::Void)]),
        );
        let ctx = MethodContext {
            class: &class,
            method: &class.methods[0],
        };
        assert!(!AssertionBranchFilter.is_applicable(&ctx));
    }
}
