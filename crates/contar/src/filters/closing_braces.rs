//! Lines holding nothing but a closing brace
//!
//! Compilers attach the implicit `return` at the end of a body, or the jump
//! out of a branch, to the line of the closing brace. Such lines never carry
//! user code and would otherwise show up as partially covered. A line is
//! dropped when it has no real instruction of its own; the last line of a
//! method is never dropped, nor is a line an earlier method of the class
//! already tracks.

use super::{FilterTable, MethodContext, MethodFilter, StageOutput};
use crate::class::{FieldOp, Insn, MethodKey};
use std::borrow::Cow;
use std::collections::BTreeSet;

const INLINE_MARKER_PREFIX: &str = "$i$f$";

/// Removes brace-only lines
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosingBracesFilter;

/// `Unit.INSTANCE` pushed by Kotlin before discarding a value
fn is_kotlin_unit(insn: &Insn) -> bool {
    matches!(
        insn,
        Insn::Field { op: FieldOp::GetStatic, owner, name, desc }
            if owner == "kotlin/Unit" && name == "INSTANCE" && desc == "Lkotlin/Unit;"
    )
}

/// Kotlin inline function bodies carry a `$i$f$<name>` marker local
fn is_inline_method(ctx: &MethodContext<'_>) -> bool {
    ctx.method.local_variables.iter().any(|var| {
        var.name
            .strip_prefix(INLINE_MARKER_PREFIX)
            .is_some_and(|rest| rest == ctx.method.name)
    })
}

struct Scan<'t> {
    key: MethodKey,
    table: &'t mut FilterTable,
    tracked: BTreeSet<u32>,
    method_lines: BTreeSet<u32>,
    lines_to_ignore: BTreeSet<u32>,
    current_line: u32,
    has_lines: bool,
    has_instructions: bool,
    seen_return: bool,
}

impl Scan<'_> {
    fn visit_line(&mut self, line: u32) {
        self.add_empty_line_to_remove();
        if self.has_lines && self.current_line == line {
            return;
        }
        let pending = self.lines_to_ignore.remove(&line);
        let seen_before = (self.method_lines.contains(&line) || self.table.is_class_line(line))
            && self.tracked.contains(&line);
        self.has_instructions = seen_before && !pending;
        self.has_lines = true;
        self.current_line = line;
        self.seen_return = false;
        let _ = self.method_lines.insert(line);
    }

    fn visit_insn(&mut self, insn: &Insn) {
        if !self.has_lines {
            return;
        }
        match insn {
            Insn::Label(_) | Insn::Line { .. } | Insn::Probe(_) => {}
            Insn::Return(_) => self.seen_return = true,
            Insn::Pop => {}
            other if is_kotlin_unit(other) => {}
            _ => self.has_instructions |= !self.seen_return,
        }
    }

    fn add_empty_line_to_remove(&mut self) {
        if !self.has_lines || self.has_instructions {
            return;
        }
        let line = self.current_line;
        if self.seen_return || !self.remove_line_if_not_single(line) {
            let _ = self.lines_to_ignore.insert(line);
        }
    }

    fn remove_line_if_not_single(&mut self, line: u32) -> bool {
        if !self.tracked.contains(&line) {
            return true;
        }
        let tracked = &self.tracked;
        self.method_lines.retain(|l| *l == line || tracked.contains(l));
        if self.method_lines.len() > 1 {
            let _ = self.tracked.remove(&line);
            let _ = self.method_lines.remove(&line);
            self.table.method_mut(&self.key).remove_line(line);
            return true;
        }
        false
    }
}

impl MethodFilter for ClosingBracesFilter {
    fn name(&self) -> &'static str {
        "closing-braces"
    }

    fn is_applicable(&self, ctx: &MethodContext<'_>) -> bool {
        ctx.method
            .instructions
            .iter()
            .filter(|i| matches!(i, Insn::Line { .. }))
            .nth(1)
            .is_some()
    }

    fn apply<'a>(
        &self,
        ctx: &MethodContext<'_>,
        code: Cow<'a, [Insn]>,
        mut table: FilterTable,
    ) -> StageOutput<'a> {
        let key = ctx.key();
        let tracked = table.tracked_lines(&key, &code);
        if tracked.len() < 2 {
            return StageOutput { code, table };
        }
        let mut scan = Scan {
            key,
            table: &mut table,
            tracked,
            method_lines: BTreeSet::new(),
            lines_to_ignore: BTreeSet::new(),
            current_line: 0,
            has_lines: false,
            has_instructions: false,
            seen_return: false,
        };
        for insn in code.iter() {
            match insn {
                Insn::Line { line, .. } => scan.visit_line(*line),
                other => scan.visit_insn(other),
            }
        }
        scan.add_empty_line_to_remove();
        if !is_inline_method(ctx) {
            let deferred: Vec<u32> = std::mem::take(&mut scan.lines_to_ignore).into_iter().collect();
            for line in deferred {
                let _ = scan.remove_line_if_not_single(line);
            }
        }
        StageOutput { code, table }
    }
}
