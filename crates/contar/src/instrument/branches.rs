//! Branch map built by the analysis pass
//!
//! Every counted branch arm gets a fresh label of its own. The map from those
//! labels to arm records is the only thing the rewrite pass needs to know
//! about branches; it lives for one method and is dropped afterwards.

use crate::class::Label;
use crate::data::HitId;
use crate::result::{ContarError, ContarResult};
use std::collections::{BTreeMap, HashMap};

/// Hands out labels that do not clash with the method's own
#[derive(Debug)]
pub(crate) struct FreshLabels {
    next: u32,
    class: String,
}

impl FreshLabels {
    pub(crate) fn new(first: u32, class: &str) -> Self {
        Self {
            next: first,
            class: class.to_string(),
        }
    }

    pub(crate) fn next(&mut self) -> ContarResult<Label> {
        let label = Label::new(self.next);
        self.next = self
            .next
            .checked_add(1)
            .ok_or_else(|| ContarError::malformed(&self.class, "label numbers exhausted"))?;
        Ok(label)
    }
}

/// One counted arm of a jump or switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchArm {
    /// Counter of the arm
    pub id: HitId,
    /// Where control continues after counting; `None` for a fall-through arm
    /// that is counted in place
    pub resume: Option<Label>,
}

/// How a branch instruction is retargeted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSite {
    /// Conditional jump
    Jump {
        /// Label the jump is retargeted to
        true_label: Label,
        /// Label placed right after the jump
        false_label: Label,
    },
    /// Table or lookup switch
    Switch {
        /// Label the default arm is retargeted to
        default: Label,
        /// Labels the case arms are retargeted to, in key order
        arms: Vec<Label>,
    },
}

/// Branch arms of one method keyed by their fresh labels
#[derive(Debug, Default)]
pub struct BranchDataContainer {
    arms: BTreeMap<Label, BranchArm>,
    sites: HashMap<usize, BranchSite>,
}

impl BranchDataContainer {
    pub(crate) fn add_jump(
        &mut self,
        index: usize,
        target: Label,
        ids: (HitId, HitId),
        labels: &mut FreshLabels,
    ) -> ContarResult<()> {
        let true_label = labels.next()?;
        let false_label = labels.next()?;
        self.insert_arm(true_label, ids.0, Some(target));
        self.insert_arm(false_label, ids.1, None);
        let _ = self.sites.insert(
            index,
            BranchSite::Jump {
                true_label,
                false_label,
            },
        );
        Ok(())
    }

    pub(crate) fn add_switch(
        &mut self,
        index: usize,
        default: (Label, HitId),
        arms: &[(Label, HitId)],
        labels: &mut FreshLabels,
    ) -> ContarResult<()> {
        let default_label = labels.next()?;
        self.insert_arm(default_label, default.1, Some(default.0));
        let mut arm_labels = Vec::with_capacity(arms.len());
        for (target, id) in arms {
            let label = labels.next()?;
            self.insert_arm(label, *id, Some(*target));
            arm_labels.push(label);
        }
        let _ = self.sites.insert(
            index,
            BranchSite::Switch {
                default: default_label,
                arms: arm_labels,
            },
        );
        Ok(())
    }

    fn insert_arm(&mut self, label: Label, id: HitId, resume: Option<Label>) {
        let previous = self.arms.insert(label, BranchArm { id, resume });
        debug_assert!(previous.is_none(), "label {} assigned twice", label.as_u32());
    }

    /// Arm counted at `label`
    #[must_use]
    pub fn arm(&self, label: Label) -> Option<&BranchArm> {
        self.arms.get(&label)
    }

    /// Retargeting of the branch instruction at slot `index`
    #[must_use]
    pub fn site(&self, index: usize) -> Option<&BranchSite> {
        self.sites.get(&index)
    }

    /// Arms that need an out-of-line counting block, in label order
    pub fn trampolines(&self) -> impl Iterator<Item = (Label, Label, HitId)> + '_ {
        self.arms
            .iter()
            .filter_map(|(label, arm)| arm.resume.map(|resume| (*label, resume, arm.id)))
    }

    /// Number of counted arms
    #[must_use]
    pub fn len(&self) -> usize {
        self.arms.len()
    }

    /// Whether the method has no counted branches
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}
