//! Per-line coverage records

use super::HitId;
use crate::runtime::HitsArray;

/// Counters of one two-way conditional branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpData {
    true_id: HitId,
    false_id: HitId,
    true_hits: u32,
    false_hits: u32,
}

impl JumpData {
    /// Create a jump counted through the given ids
    #[must_use]
    pub fn new(true_id: HitId, false_id: HitId) -> Self {
        Self {
            true_id,
            false_id,
            true_hits: 0,
            false_hits: 0,
        }
    }

    /// Times the branch was taken
    #[must_use]
    pub fn true_hits(&self) -> u32 {
        self.true_hits
    }

    /// Times the branch fell through
    #[must_use]
    pub fn false_hits(&self) -> u32 {
        self.false_hits
    }

    /// Id counting the taken direction
    #[must_use]
    pub fn true_id(&self) -> HitId {
        self.true_id
    }

    /// Id counting the fall-through direction
    #[must_use]
    pub fn false_id(&self) -> HitId {
        self.false_id
    }
}

/// Counters of one multi-way branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchData {
    keys: Vec<i32>,
    key_ids: Vec<HitId>,
    hits: Vec<u32>,
    default_id: HitId,
    default_hits: u32,
}

impl SwitchData {
    /// Create a switch over `keys`; `key_ids` parallels `keys`
    #[must_use]
    pub fn new(keys: Vec<i32>, key_ids: Vec<HitId>, default_id: HitId) -> Self {
        let hits = vec![0; keys.len()];
        Self {
            keys,
            key_ids,
            hits,
            default_id,
            default_hits: 0,
        }
    }

    /// Case keys
    #[must_use]
    pub fn keys(&self) -> &[i32] {
        &self.keys
    }

    /// Hits per case key, parallel to [`Self::keys`]
    #[must_use]
    pub fn hits(&self) -> &[u32] {
        &self.hits
    }

    /// Times the default arm ran
    #[must_use]
    pub fn default_hits(&self) -> u32 {
        self.default_hits
    }

    /// Ids of the case arms
    #[must_use]
    pub fn key_ids(&self) -> &[HitId] {
        &self.key_ids
    }

    /// Id of the default arm
    #[must_use]
    pub fn default_id(&self) -> HitId {
        self.default_id
    }

    fn ensure_keys(&mut self, keys: &[i32]) {
        if self.keys != keys {
            self.keys = keys.to_vec();
            self.hits.resize(keys.len(), 0);
            self.key_ids.resize(keys.len(), HitId::UNRESOLVED);
        }
    }
}

/// One tracked source line within one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineData {
    line: u32,
    id: HitId,
    hits: u32,
    method_signature: String,
    test_name: Option<String>,
    jumps: Vec<JumpData>,
    switches: Vec<SwitchData>,
}

impl LineData {
    /// Create an unresolved line owned by `method_signature`
    #[must_use]
    pub fn new(line: u32, method_signature: &str) -> Self {
        Self {
            line,
            id: HitId::UNRESOLVED,
            hits: 0,
            method_signature: method_signature.to_string(),
            test_name: None,
            jumps: Vec::new(),
            switches: Vec::new(),
        }
    }

    /// Source line number
    #[must_use]
    pub fn line_number(&self) -> u32 {
        self.line
    }

    /// Hit id of the line itself
    #[must_use]
    pub fn id(&self) -> HitId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: HitId) {
        self.id = id;
    }

    /// Times the line ran
    #[must_use]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Set the hit count
    pub fn set_hits(&mut self, hits: u32) {
        self.hits = hits;
    }

    /// Signature (`name` + descriptor) of the owning method
    #[must_use]
    pub fn method_signature(&self) -> &str {
        &self.method_signature
    }

    /// Name of the test that covered this line, if recorded
    #[must_use]
    pub fn test_name(&self) -> Option<&str> {
        self.test_name.as_deref()
    }

    /// Record the covering test; empty names clear it
    pub fn set_test_name(&mut self, name: &str) {
        self.test_name = (!name.is_empty()).then(|| name.to_string());
    }

    /// Conditional branches starting on this line
    #[must_use]
    pub fn jumps(&self) -> &[JumpData] {
        &self.jumps
    }

    /// Switches starting on this line
    #[must_use]
    pub fn switches(&self) -> &[SwitchData] {
        &self.switches
    }

    /// Append a jump and return its index within the line
    pub(crate) fn add_jump(&mut self, jump: JumpData) -> usize {
        self.jumps.push(jump);
        self.jumps.len() - 1
    }

    /// Append a switch and return its index within the line
    pub(crate) fn add_switch(&mut self, switch: SwitchData) -> usize {
        self.switches.push(switch);
        self.switches.len() - 1
    }

    fn jump_mut(&mut self, index: usize) -> &mut JumpData {
        if self.jumps.len() <= index {
            self.jumps.resize_with(index + 1, JumpData::default);
        }
        &mut self.jumps[index]
    }

    fn switch_mut(&mut self, index: usize, keys: &[i32]) -> &mut SwitchData {
        if self.switches.len() <= index {
            self.switches.resize_with(index + 1, SwitchData::default);
        }
        let switch = &mut self.switches[index];
        switch.ensure_keys(keys);
        switch
    }

    /// Set the taken count of jump `index`, creating it if needed
    pub fn set_true_hits(&mut self, index: usize, hits: u32) {
        self.jump_mut(index).true_hits = hits;
    }

    /// Set the fall-through count of jump `index`, creating it if needed
    pub fn set_false_hits(&mut self, index: usize, hits: u32) {
        self.jump_mut(index).false_hits = hits;
    }

    /// Set the default-arm count of switch `index`, creating it if needed
    pub fn set_default_hits(&mut self, index: usize, keys: &[i32], hits: u32) {
        self.switch_mut(index, keys).default_hits = hits;
    }

    /// Set the per-key counts of switch `index`, creating it if needed
    pub fn set_switch_hits(&mut self, index: usize, keys: &[i32], hits: &[u32]) {
        let switch = self.switch_mut(index, keys);
        for (slot, value) in switch.hits.iter_mut().zip(hits) {
            *slot = *value;
        }
    }

    /// Copy counters of this line and its branches out of `array`
    pub(crate) fn apply_hits(&mut self, array: &HitsArray) {
        if self.id.is_resolved() {
            self.hits = array.get(self.id);
        }
        for jump in &mut self.jumps {
            if jump.true_id.is_resolved() {
                jump.true_hits = array.get(jump.true_id);
            }
            if jump.false_id.is_resolved() {
                jump.false_hits = array.get(jump.false_id);
            }
        }
        for switch in &mut self.switches {
            if switch.default_id.is_resolved() {
                switch.default_hits = array.get(switch.default_id);
            }
            for (slot, id) in switch.hits.iter_mut().zip(&switch.key_ids) {
                if id.is_resolved() {
                    *slot = array.get(*id);
                }
            }
        }
    }
}
