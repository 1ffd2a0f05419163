//! Rewrite pass: probe injection

use super::analysis::MethodPlan;
use super::branches::BranchSite;
use crate::class::{Insn, JumpCond, MethodNode, Probe};
use crate::config::CounterStorage;
use crate::data::HitId;

fn hit(id: HitId) -> Option<Insn> {
    id.index()
        .and_then(|i| u32::try_from(i).ok())
        .map(|id| Insn::Probe(Probe::Hit { id }))
}

/// Produce the instrumented body of `method` from its filtered `code`
pub(crate) fn rewrite_method(
    method: &MethodNode,
    code: &[Insn],
    plan: &MethodPlan,
    storage: CounterStorage,
) -> MethodNode {
    let mut out = method.clone();
    match plan {
        MethodPlan::Untouched => out.instructions = code.to_vec(),
        MethodPlan::TouchOnly => {
            out.instructions = Vec::with_capacity(code.len() + 1);
            out.instructions.push(Insn::Probe(Probe::Touch));
            out.instructions.extend_from_slice(code);
        }
        MethodPlan::Counted {
            base,
            len,
            line_ids,
            branches,
        } => {
            let local = storage == CounterStorage::MethodLocal;
            let mut body = Vec::with_capacity(code.len() * 2 + branches.len() * 3 + 1);
            body.push(Insn::Probe(if local {
                Probe::EnterFrame {
                    base: *base,
                    len: *len,
                }
            } else {
                Probe::LoadHits
            }));

            for (index, insn) in code.iter().enumerate() {
                if local && insn.is_exit() {
                    body.push(Insn::Probe(Probe::FlushFrame));
                }
                match (insn, branches.site(index)) {
                    (Insn::Jump { cond, .. }, Some(BranchSite::Jump { true_label, false_label })) => {
                        body.push(Insn::Jump {
                            cond: *cond,
                            target: *true_label,
                        });
                        body.push(Insn::Label(*false_label));
                        body.extend(branches.arm(*false_label).and_then(|arm| hit(arm.id)));
                    }
                    (Insn::TableSwitch { min, max, .. }, Some(BranchSite::Switch { default, arms })) => {
                        body.push(Insn::TableSwitch {
                            min: *min,
                            max: *max,
                            default: *default,
                            targets: arms.clone(),
                        });
                    }
                    (Insn::LookupSwitch { keys, .. }, Some(BranchSite::Switch { default, arms })) => {
                        body.push(Insn::LookupSwitch {
                            default: *default,
                            keys: keys.clone(),
                            targets: arms.clone(),
                        });
                    }
                    _ => {
                        body.push(insn.clone());
                        if let Some(id) = line_ids.get(&index) {
                            body.extend(hit(*id));
                        }
                    }
                }
            }

            for (label, resume, id) in branches.trampolines() {
                body.push(Insn::Label(label));
                body.extend(hit(id));
                body.push(Insn::Jump {
                    cond: JumpCond::Always,
                    target: resume,
                });
            }
            out.instructions = body;
        }
    }
    out
}
