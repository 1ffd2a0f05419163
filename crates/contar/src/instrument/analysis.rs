//! Analysis pass: identifier allocation
//!
//! Walks one method, allocates dense ids for tracked lines and for every arm
//! of each resolved branch, and records the branch arms in a
//! [`BranchDataContainer`]. Ids of one method are contiguous. A branch counts
//! as resolved when the line it sits on is tracked and its slot is not in an
//! ignored region; unresolved branches get no id and no record.

use super::branches::{BranchDataContainer, FreshLabels};
use crate::class::{Insn, Label, MethodNode};
use crate::data::{ClassData, HitId, JumpData, SwitchData};
use crate::filters::FilterTable;
use crate::result::ContarResult;
use std::collections::HashMap;

/// What the rewrite pass does with one method
#[derive(Debug)]
pub(crate) enum MethodPlan {
    /// Emit the method unchanged
    Untouched,
    /// No tracked lines; only record the invocation
    TouchOnly,
    /// Count lines and branches
    Counted {
        base: u32,
        len: u32,
        line_ids: HashMap<usize, HitId>,
        branches: BranchDataContainer,
    },
}

pub(crate) fn analyze_method(
    class: &mut ClassData,
    internal_name: &str,
    method: &MethodNode,
    code: &[Insn],
    table: &FilterTable,
    branch_coverage: bool,
) -> ContarResult<MethodPlan> {
    let key = method.key();
    if code.is_empty() || table.method(&key).is_some_and(|s| s.is_skipped()) {
        return Ok(MethodPlan::Untouched);
    }
    let tracked = table.tracked_lines(&key, code);
    if tracked.is_empty() {
        return Ok(MethodPlan::TouchOnly);
    }

    let signature = key.signature();
    let base = u32::try_from(class.id_count()).unwrap_or(u32::MAX);
    let mut labels = FreshLabels::new(method.next_free_label(), internal_name);
    let mut line_ids = HashMap::new();
    let mut branches = BranchDataContainer::default();
    let mut current_line: Option<u32> = None;

    for (index, insn) in code.iter().enumerate() {
        let slot_tracked = table.is_slot_tracked(&key, index);
        match insn {
            Insn::Line { line, .. } => {
                current_line = None;
                if slot_tracked && tracked.contains(line) {
                    let id = line_id(class, *line, &signature)?;
                    let _ = line_ids.insert(index, id);
                    current_line = Some(*line);
                }
            }
            Insn::Jump { cond, target } if branch_coverage && cond.is_conditional() && slot_tracked => {
                let Some(line) = current_line else { continue };
                let true_id = class.allocate_id()?;
                let false_id = class.allocate_id()?;
                if let Some(data) = class.line_mut(line) {
                    let _ = data.add_jump(JumpData::new(true_id, false_id));
                }
                branches.add_jump(index, *target, (true_id, false_id), &mut labels)?;
            }
            Insn::TableSwitch {
                min,
                max,
                default,
                targets,
            } if branch_coverage && slot_tracked => {
                let Some(line) = current_line else { continue };
                let keys: Vec<i32> = (*min..=*max).collect();
                add_switch(class, &mut branches, &mut labels, (index, line), *default, &keys, targets)?;
            }
            Insn::LookupSwitch {
                default,
                keys,
                targets,
            } if branch_coverage && slot_tracked => {
                let Some(line) = current_line else { continue };
                add_switch(class, &mut branches, &mut labels, (index, line), *default, keys, targets)?;
            }
            _ => {}
        }
    }

    let end = u32::try_from(class.id_count()).unwrap_or(u32::MAX);
    Ok(MethodPlan::Counted {
        base,
        len: end - base,
        line_ids,
        branches,
    })
}

/// Id of a line, created for this method unless another method owns it
fn line_id(class: &mut ClassData, line: u32, signature: &str) -> ContarResult<HitId> {
    let existing = class.get_or_create_line(line, signature).id();
    if existing.is_resolved() {
        return Ok(existing);
    }
    let id = class.allocate_id()?;
    if let Some(data) = class.line_mut(line) {
        data.set_id(id);
    }
    class.register_method_signature(line);
    Ok(id)
}

fn add_switch(
    class: &mut ClassData,
    branches: &mut BranchDataContainer,
    labels: &mut FreshLabels,
    (index, line): (usize, u32),
    default: Label,
    keys: &[i32],
    targets: &[Label],
) -> ContarResult<()> {
    let default_id = class.allocate_id()?;
    let mut arms = Vec::with_capacity(targets.len());
    for target in targets {
        arms.push((*target, class.allocate_id()?));
    }
    let key_ids = arms.iter().map(|(_, id)| *id).collect();
    if let Some(data) = class.line_mut(line) {
        let _ = data.add_switch(SwitchData::new(keys.to_vec(), key_ids, default_id));
    }
    branches.add_switch(index, (default, default_id), &arms, labels)
}
