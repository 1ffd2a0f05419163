//! Raw class stream codec and layout validation

use super::descriptor::MethodDesc;
use super::{ClassFile, Insn, Label, MethodNode};
use crate::result::{ContarError, ContarResult};
use bincode::Options;
use std::collections::HashSet;

/// Upper bound for a single encoded class
const MAX_CLASS_BYTES: u64 = 64 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_CLASS_BYTES)
}

impl ClassFile {
    /// Decode and validate a class from its raw form
    pub fn from_bytes(bytes: &[u8]) -> ContarResult<Self> {
        let class: Self = codec().deserialize(bytes)?;
        class.validate()?;
        Ok(class)
    }

    /// Encode the class into its raw form
    pub fn to_bytes(&self) -> ContarResult<Vec<u8>> {
        Ok(codec().serialize(self)?)
    }

    /// Check that every method body has a layout the instrumenter understands
    pub fn validate(&self) -> ContarResult<()> {
        if self.name.is_empty() {
            return Err(ContarError::malformed("", "class has no name"));
        }
        for method in &self.methods {
            validate_method(&self.name, method)?;
        }
        Ok(())
    }
}

fn validate_method(class: &str, method: &MethodNode) -> ContarResult<()> {
    let fail = |message: String| ContarError::malformed(class, format!("{}{}: {message}", method.name, method.desc));

    if MethodDesc::parse(&method.desc).is_none() {
        return Err(fail("invalid method descriptor".to_string()));
    }

    let mut bound: HashSet<Label> = HashSet::new();
    for insn in &method.instructions {
        if let Insn::Label(label) = insn {
            if !bound.insert(*label) {
                return Err(fail(format!("label {} bound twice", label.as_u32())));
            }
        }
    }

    for insn in &method.instructions {
        if let Some(label) = insn.referenced_labels().into_iter().find(|l| !bound.contains(l)) {
            return Err(fail(format!("label {} is never bound", label.as_u32())));
        }
        match insn {
            Insn::TableSwitch {
                min, max, targets, ..
            } => {
                let expected = i64::from(*max) - i64::from(*min) + 1;
                if expected < 1 || expected != targets.len() as i64 {
                    return Err(fail(format!(
                        "table switch {min}..={max} has {} targets",
                        targets.len()
                    )));
                }
            }
            Insn::LookupSwitch { keys, targets, .. } => {
                if keys.len() != targets.len() {
                    return Err(fail(format!(
                        "lookup switch has {} keys and {} targets",
                        keys.len(),
                        targets.len()
                    )));
                }
                if keys.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(fail("lookup switch keys are not sorted".to_string()));
                }
            }
            Insn::Probe(_) => {
                return Err(fail("body already contains coverage probes".to_string()));
            }
            _ => {}
        }
    }

    let last_real = method.instructions.iter().rev().find(|i| !i.is_pseudo());
    if let Some(last) = last_real {
        if !last.is_terminal() {
            return Err(fail("control falls off the end of the body".to_string()));
        }
    }
    Ok(())
}
