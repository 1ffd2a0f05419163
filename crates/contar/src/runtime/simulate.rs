//! Reference interpreter for instrumented classes
//!
//! Executes the abstract instruction set so instrumented output can be
//! checked end to end without a host virtual machine. Values are `i64`;
//! object references are opaque handles. Calls resolve only to methods of
//! the class being simulated.

use super::{HitsArray, LocalHits};
use crate::class::descriptor::MethodDesc;
use crate::class::{AccessFlags, ArithOp, ClassFile, FieldOp, Insn, Label, MethodNode, Probe, ReturnKind};
use crate::data::{lock_class, HitId, ProjectData};
use crate::result::{ContarError, ContarResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Default bound on executed instructions per top-level invocation
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

const MAX_CALL_DEPTH: usize = 256;

fn exec_error(message: impl Into<String>) -> ContarError {
    ContarError::Execution {
        message: message.into(),
    }
}

/// Interpreter bound to one class and its hits array
#[derive(Debug)]
pub struct Simulator<'c> {
    class: &'c ClassFile,
    hits: Arc<HitsArray>,
    statics: HashMap<String, i64>,
    fields: HashMap<(i64, String), i64>,
    next_object: i64,
    step_limit: usize,
    steps: usize,
}

struct Frame {
    locals: Vec<i64>,
    stack: Vec<i64>,
    local_hits: Option<LocalHits>,
    hits_bound: bool,
}

impl Frame {
    fn pop(&mut self, method: &MethodNode) -> ContarResult<i64> {
        self.stack
            .pop()
            .ok_or_else(|| exec_error(format!("operand stack underflow in {}{}", method.name, method.desc)))
    }

    fn load(&self, var: u16) -> i64 {
        self.locals.get(usize::from(var)).copied().unwrap_or(0)
    }

    fn store(&mut self, var: u16, value: i64) {
        let index = usize::from(var);
        if index >= self.locals.len() {
            self.locals.resize(index + 1, 0);
        }
        self.locals[index] = value;
    }
}

impl<'c> Simulator<'c> {
    /// Create a simulator writing hits into `hits`
    #[must_use]
    pub fn new(class: &'c ClassFile, hits: Arc<HitsArray>) -> Self {
        Self {
            class,
            hits,
            statics: HashMap::new(),
            fields: HashMap::new(),
            next_object: 1,
            step_limit: DEFAULT_STEP_LIMIT,
            steps: 0,
        }
    }

    /// Create a simulator using the hits array registered for `class`
    pub fn for_project(class: &'c ClassFile, project: &ProjectData) -> ContarResult<Self> {
        let name = class.dotted_name();
        let handle = project
            .class_data(&name)
            .ok_or_else(|| exec_error(format!("class {name} is not registered")))?;
        let hits = lock_class(&handle)
            .hits()
            .cloned()
            .ok_or_else(|| exec_error(format!("class {name} has no hits array")))?;
        Ok(Self::new(class, hits))
    }

    /// Bound the number of executed instructions per invocation
    #[must_use]
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// The hits array increments go to
    #[must_use]
    pub fn hits(&self) -> &Arc<HitsArray> {
        &self.hits
    }

    /// Invoke a method of the class with integer arguments
    ///
    /// Instance methods receive an implicit receiver in slot 0.
    pub fn invoke(&mut self, name: &str, desc: &str, args: &[i64]) -> ContarResult<Option<i64>> {
        self.steps = 0;
        self.call(name, desc, args.to_vec(), None, 0)
    }

    fn find_method(&self, name: &str, desc: &str) -> ContarResult<&'c MethodNode> {
        let class = self.class;
        class
            .methods
            .iter()
            .find(|m| m.name == name && m.desc == desc)
            .ok_or_else(|| exec_error(format!("no method {name}{desc} in {}", class.name)))
    }

    fn call(
        &mut self,
        name: &str,
        desc: &str,
        args: Vec<i64>,
        receiver: Option<i64>,
        depth: usize,
    ) -> ContarResult<Option<i64>> {
        if depth >= MAX_CALL_DEPTH {
            return Err(exec_error(format!("call depth exceeded in {name}{desc}")));
        }
        let method = self.find_method(name, desc)?;
        let arity = MethodDesc::parse(desc)
            .map(|d| d.args.len())
            .ok_or_else(|| exec_error(format!("bad descriptor {desc}")))?;
        if args.len() != arity {
            return Err(exec_error(format!(
                "{name}{desc} takes {arity} arguments, got {}",
                args.len()
            )));
        }
        let mut locals = Vec::with_capacity(arity + 1);
        if !method.access.contains(AccessFlags::STATIC) {
            locals.push(receiver.unwrap_or(0));
        }
        locals.extend(args);
        self.run(method, locals, depth)
    }

    fn run(&mut self, method: &'c MethodNode, locals: Vec<i64>, depth: usize) -> ContarResult<Option<i64>> {
        let code = &method.instructions;
        let labels: HashMap<Label, usize> = code
            .iter()
            .enumerate()
            .filter_map(|(pc, insn)| match insn {
                Insn::Label(label) => Some((*label, pc)),
                _ => None,
            })
            .collect();
        let jump = |label: &Label| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| exec_error(format!("unbound label {} in {}", label.as_u32(), method.name)))
        };

        let mut frame = Frame {
            locals,
            stack: Vec::new(),
            local_hits: None,
            hits_bound: false,
        };
        let mut pc = 0;
        loop {
            let insn = code
                .get(pc)
                .ok_or_else(|| exec_error(format!("fell off the end of {}{}", method.name, method.desc)))?;
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(exec_error(format!("step limit {} exceeded", self.step_limit)));
            }
            pc += 1;
            match insn {
                Insn::Label(_) | Insn::Line { .. } | Insn::Nop => {}
                Insn::Const(value) => frame.stack.push(*value),
                Insn::Load(var) => frame.stack.push(frame.load(*var)),
                Insn::Store(var) => {
                    let value = frame.pop(method)?;
                    frame.store(*var, value);
                }
                Insn::Iinc { var, delta } => {
                    let value = frame.load(*var).wrapping_add(i64::from(*delta));
                    frame.store(*var, value);
                }
                Insn::Arith(op) => {
                    let b = frame.pop(method)?;
                    let value = match op {
                        ArithOp::Neg => b.wrapping_neg(),
                        ArithOp::Add => frame.pop(method)?.wrapping_add(b),
                        ArithOp::Sub => frame.pop(method)?.wrapping_sub(b),
                        ArithOp::Mul => frame.pop(method)?.wrapping_mul(b),
                    };
                    frame.stack.push(value);
                }
                Insn::Pop => {
                    let _ = frame.pop(method)?;
                }
                Insn::Jump { cond, target } => {
                    let (a, b) = match cond.operand_count() {
                        0 => (0, 0),
                        1 => (0, frame.pop(method)?),
                        _ => {
                            let b = frame.pop(method)?;
                            (frame.pop(method)?, b)
                        }
                    };
                    if cond.holds(a, b) {
                        pc = jump(target)?;
                    }
                }
                Insn::TableSwitch {
                    min,
                    max,
                    default,
                    targets,
                } => {
                    let key = frame.pop(method)?;
                    let target = if (i64::from(*min)..=i64::from(*max)).contains(&key) {
                        usize::try_from(key - i64::from(*min))
                            .ok()
                            .and_then(|i| targets.get(i))
                            .unwrap_or(default)
                    } else {
                        default
                    };
                    pc = jump(target)?;
                }
                Insn::LookupSwitch {
                    default,
                    keys,
                    targets,
                } => {
                    let key = frame.pop(method)?;
                    let target = i32::try_from(key)
                        .ok()
                        .and_then(|k| keys.binary_search(&k).ok())
                        .and_then(|i| targets.get(i))
                        .unwrap_or(default);
                    pc = jump(target)?;
                }
                Insn::Field { op, owner, name, .. } => {
                    let key = format!("{owner}.{name}");
                    match op {
                        FieldOp::GetStatic => {
                            frame.stack.push(self.statics.get(&key).copied().unwrap_or(0));
                        }
                        FieldOp::PutStatic => {
                            let value = frame.pop(method)?;
                            let _ = self.statics.insert(key, value);
                        }
                        FieldOp::GetField => {
                            let object = frame.pop(method)?;
                            frame
                                .stack
                                .push(self.fields.get(&(object, key)).copied().unwrap_or(0));
                        }
                        FieldOp::PutField => {
                            let value = frame.pop(method)?;
                            let object = frame.pop(method)?;
                            let _ = self.fields.insert((object, key), value);
                        }
                    }
                }
                Insn::New(_) => {
                    frame.stack.push(self.next_object);
                    self.next_object += 1;
                }
                Insn::Invoke { owner, name, desc } => {
                    if *owner != self.class.name {
                        return Err(exec_error(format!("cannot resolve call to {owner}.{name}{desc}")));
                    }
                    let target = self.find_method(name, desc)?;
                    let arity = MethodDesc::parse(desc)
                        .map(|d| d.args.len())
                        .ok_or_else(|| exec_error(format!("bad descriptor {desc}")))?;
                    if frame.stack.len() < arity {
                        return Err(exec_error(format!("operand stack underflow calling {name}{desc}")));
                    }
                    let args = frame.stack.split_off(frame.stack.len() - arity);
                    let receiver = if target.access.contains(AccessFlags::STATIC) {
                        None
                    } else {
                        Some(frame.pop(method)?)
                    };
                    let result = self.call(name, desc, args, receiver, depth + 1)?;
                    if let Some(value) = result {
                        frame.stack.push(value);
                    }
                }
                Insn::Return(kind) => {
                    return match kind {
                        ReturnKind::Void => Ok(None),
                        ReturnKind::Value => frame.pop(method).map(Some),
                    };
                }
                Insn::Throw => {
                    let value = frame.pop(method)?;
                    return Err(exec_error(format!(
                        "uncaught throw of {value} in {}{}",
                        method.name, method.desc
                    )));
                }
                Insn::Probe(probe) => self.probe(*probe, &mut frame, method)?,
            }
        }
    }

    fn probe(&self, probe: Probe, frame: &mut Frame, method: &MethodNode) -> ContarResult<()> {
        match probe {
            Probe::LoadHits => frame.hits_bound = true,
            Probe::EnterFrame { base, len } => {
                frame.local_hits = Some(LocalHits::new(base, len));
                frame.hits_bound = true;
            }
            Probe::FlushFrame => {
                if let Some(local) = frame.local_hits.as_mut() {
                    local.flush_into(&self.hits);
                }
            }
            Probe::Hit { id } => {
                if !frame.hits_bound {
                    return Err(exec_error(format!(
                        "hit {id} before hits were bound in {}{}",
                        method.name, method.desc
                    )));
                }
                let id = HitId::new(id);
                let counted = frame
                    .local_hits
                    .as_mut()
                    .is_some_and(|local| local.increment(id));
                if !counted {
                    self.hits.increment(id);
                }
            }
            Probe::Touch => self.hits.touch(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::JumpCond;

    fn abs_class() -> ClassFile {
        let code = vec![
            Insn::Label(Label::new(0)),
            Insn::Line {
                line: 1,
                start: Label::new(0),
            },
            Insn::Probe(Probe::LoadHits),
            Insn::Probe(Probe::Hit { id: 0 }),
            Insn::Load(0),
            Insn::Jump {
                cond: JumpCond::IfGe,
                target: Label::new(1),
            },
            Insn::Load(0),
            Insn::Arith(ArithOp::Neg),
            Insn::Return(ReturnKind::Value),
            Insn::Label(Label::new(1)),
            Insn::Load(0),
            Insn::Return(ReturnKind::Value),
        ];
        let caller = vec![
            Insn::Const(-4),
            Insn::Invoke {
                owner: "t/Abs".to_string(),
                name: "abs".to_string(),
                desc: "(I)I".to_string(),
            },
            Insn::Const(3),
            Insn::Arith(ArithOp::Mul),
            Insn::Return(ReturnKind::Value),
        ];
        ClassFile::new("t/Abs")
            .with_method(MethodNode::new("abs", "(I)I").with_access(AccessFlags::STATIC).with_code(code))
            .with_method(MethodNode::new("twelve", "()I").with_access(AccessFlags::STATIC).with_code(caller))
    }

    #[test]
    fn test_executes_and_counts() {
        let class = abs_class();
        let hits = Arc::new(HitsArray::new(1));
        let mut sim = Simulator::new(&class, Arc::clone(&hits));
        assert_eq!(sim.invoke("abs", "(I)I", &[-5]).unwrap(), Some(5));
        assert_eq!(sim.invoke("abs", "(I)I", &[7]).unwrap(), Some(7));
        assert_eq!(sim.invoke("twelve", "()I", &[]).unwrap(), Some(12));
        assert_eq!(hits.snapshot(), vec![3]);
    }

    #[test]
    fn test_step_limit() {
        let code = vec![
            Insn::Label(Label::new(0)),
            Insn::Jump {
                cond: JumpCond::Always,
                target: Label::new(0),
            },
        ];
        let class = ClassFile::new("t/Spin").with_method(
            MethodNode::new("spin", "()V")
                .with_access(AccessFlags::STATIC)
                .with_code(code),
        );
        let mut sim = Simulator::new(&class, Arc::new(HitsArray::new(0))).with_step_limit(100);
        assert!(matches!(
            sim.invoke("spin", "()V", &[]),
            Err(ContarError::Execution { .. })
        ));
    }

    #[test]
    fn test_hit_requires_binding() {
        let class = ClassFile::new("t/Bad").with_method(
            MethodNode::new("m", "()V")
                .with_access(AccessFlags::STATIC)
                .with_code(vec![
                    Insn::Probe(Probe::Hit { id: 0 }),
                    Insn::Return(ReturnKind::Void),
                ]),
        );
        let mut sim = Simulator::new(&class, Arc::new(HitsArray::new(1)));
        assert!(sim.invoke("m", "()V", &[]).is_err());
    }

    #[test]
    fn test_wrong_arity_and_missing_method() {
        let class = abs_class();
        let mut sim = Simulator::new(&class, Arc::new(HitsArray::new(1)));
        assert!(sim.invoke("abs", "(I)I", &[]).is_err());
        assert!(sim.invoke("missing", "()V", &[]).is_err());
    }

    #[test]
    fn test_switch_and_statics() {
        let code = vec![
            Insn::Load(0),
            Insn::LookupSwitch {
                default: Label::new(2),
                keys: vec![-1, 10],
                targets: vec![Label::new(0), Label::new(1)],
            },
            Insn::Label(Label::new(0)),
            Insn::Const(100),
            Insn::Jump {
                cond: JumpCond::Always,
                target: Label::new(3),
            },
            Insn::Label(Label::new(1)),
            Insn::Const(200),
            Insn::Jump {
                cond: JumpCond::Always,
                target: Label::new(3),
            },
            Insn::Label(Label::new(2)),
            Insn::Const(300),
            Insn::Label(Label::new(3)),
            Insn::Field {
                op: FieldOp::PutStatic,
                owner: "t/Sw".to_string(),
                name: "last".to_string(),
                desc: "I".to_string(),
            },
            Insn::Field {
                op: FieldOp::GetStatic,
                owner: "t/Sw".to_string(),
                name: "last".to_string(),
                desc: "I".to_string(),
            },
            Insn::Return(ReturnKind::Value),
        ];
        let class = ClassFile::new("t/Sw").with_method(
            MethodNode::new("pick", "(I)I")
                .with_access(AccessFlags::STATIC)
                .with_code(code),
        );
        let mut sim = Simulator::new(&class, Arc::new(HitsArray::new(0)));
        assert_eq!(sim.invoke("pick", "(I)I", &[10]).unwrap(), Some(200));
        assert_eq!(sim.invoke("pick", "(I)I", &[-1]).unwrap(), Some(100));
        assert_eq!(sim.invoke("pick", "(I)I", &[5]).unwrap(), Some(300));
    }
}
