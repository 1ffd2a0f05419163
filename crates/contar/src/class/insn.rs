//! Abstract stack-machine instruction set
//!
//! Compiled method bodies arrive as a flat stream of [`Insn`] values. Labels and
//! line markers are pseudo-instructions: they occupy a slot in the stream but
//! do nothing at run time. [`Insn::Probe`] is never present in input; the
//! instrumenter injects it.

use serde::{Deserialize, Serialize};

/// Control-flow target marker
///
/// Cannot be confused with a line number or a hit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(u32);

impl Label {
    /// Create a label with the given number
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Jump condition
///
/// The `If*` conditions compare the top of the stack against zero, the
/// `IfCmp*` conditions compare the two topmost values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpCond {
    /// Unconditional jump (goto)
    Always,
    /// value == 0
    IfEq,
    /// value != 0
    IfNe,
    /// value < 0
    IfLt,
    /// value >= 0
    IfGe,
    /// value > 0
    IfGt,
    /// value <= 0
    IfLe,
    /// a == b
    IfCmpEq,
    /// a != b
    IfCmpNe,
    /// a < b
    IfCmpLt,
    /// a >= b
    IfCmpGe,
    /// a > b
    IfCmpGt,
    /// a <= b
    IfCmpLe,
}

impl JumpCond {
    /// Whether the jump may fall through
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        !matches!(self, Self::Always)
    }

    /// Number of operands popped from the stack
    #[must_use]
    pub const fn operand_count(self) -> usize {
        match self {
            Self::Always => 0,
            Self::IfEq | Self::IfNe | Self::IfLt | Self::IfGe | Self::IfGt | Self::IfLe => 1,
            _ => 2,
        }
    }

    /// Evaluate the condition for `a` (deeper operand) and `b` (top of stack)
    ///
    /// Single-operand conditions compare `b` against zero and ignore `a`.
    #[must_use]
    pub const fn holds(self, a: i64, b: i64) -> bool {
        match self {
            Self::Always => true,
            Self::IfEq => b == 0,
            Self::IfNe => b != 0,
            Self::IfLt => b < 0,
            Self::IfGe => b >= 0,
            Self::IfGt => b > 0,
            Self::IfLe => b <= 0,
            Self::IfCmpEq => a == b,
            Self::IfCmpNe => a != b,
            Self::IfCmpLt => a < b,
            Self::IfCmpGe => a >= b,
            Self::IfCmpGt => a > b,
            Self::IfCmpLe => a <= b,
        }
    }
}

/// Integer arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    /// a + b
    Add,
    /// a - b
    Sub,
    /// a * b
    Mul,
    /// -a
    Neg,
}

/// Field access kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOp {
    /// Read a static field
    GetStatic,
    /// Write a static field
    PutStatic,
    /// Read an instance field
    GetField,
    /// Write an instance field
    PutField,
}

/// Return kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    /// Return without a value
    Void,
    /// Return the top of the stack
    Value,
}

/// Coverage bookkeeping injected by the instrumenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Probe {
    /// Bind the class-owned hits array for this invocation
    LoadHits,
    /// Allocate a method-local hits buffer covering ids `base..base + len`
    EnterFrame {
        /// First id owned by the method
        base: u32,
        /// Number of ids owned by the method
        len: u32,
    },
    /// Add the method-local buffer into the class-owned totals
    FlushFrame,
    /// Increment the counter with the given id
    Hit {
        /// Dense hit id
        id: u32,
    },
    /// Record that a method without tracked lines was invoked
    Touch,
}

/// One slot of a method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insn {
    /// Binds a control-flow target marker at this position
    Label(Label),
    /// Source line marker starting at `start`
    Line {
        /// Source line number
        line: u32,
        /// Label the line starts at
        start: Label,
    },
    /// No operation
    Nop,
    /// Push a constant
    Const(i64),
    /// Push a local variable
    Load(u16),
    /// Pop into a local variable
    Store(u16),
    /// Add a constant to a local variable
    Iinc {
        /// Local variable index
        var: u16,
        /// Increment
        delta: i32,
    },
    /// Integer arithmetic on the stack
    Arith(ArithOp),
    /// Discard the top of the stack
    Pop,
    /// Conditional or unconditional jump
    Jump {
        /// Jump condition
        cond: JumpCond,
        /// Jump target
        target: Label,
    },
    /// Dense switch over `min..=max`
    TableSwitch {
        /// Lowest key
        min: i32,
        /// Highest key
        max: i32,
        /// Target when the key is out of range
        default: Label,
        /// One target per key
        targets: Vec<Label>,
    },
    /// Sparse switch over sorted keys
    LookupSwitch {
        /// Target when no key matches
        default: Label,
        /// Strictly increasing keys
        keys: Vec<i32>,
        /// One target per key
        targets: Vec<Label>,
    },
    /// Field access
    Field {
        /// Access kind
        op: FieldOp,
        /// Owner internal name
        owner: String,
        /// Field name
        name: String,
        /// Field descriptor
        desc: String,
    },
    /// Method invocation
    Invoke {
        /// Owner internal name
        owner: String,
        /// Method name
        name: String,
        /// Method descriptor
        desc: String,
    },
    /// Allocate an object of the given internal type name
    New(String),
    /// Return from the method
    Return(ReturnKind),
    /// Throw the top of the stack
    Throw,
    /// Injected coverage bookkeeping
    Probe(Probe),
}

impl Insn {
    /// Labels and line markers are not executable
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        matches!(self, Self::Label(_) | Self::Line { .. })
    }

    /// Control never falls through to the next slot
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Return(_)
                | Self::Throw
                | Self::TableSwitch { .. }
                | Self::LookupSwitch { .. }
                | Self::Jump {
                    cond: JumpCond::Always,
                    ..
                }
        )
    }

    /// Leaves the method (the method-local buffer must be flushed first)
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self, Self::Return(_) | Self::Throw)
    }

    /// All labels this instruction refers to
    #[must_use]
    pub fn referenced_labels(&self) -> Vec<Label> {
        match self {
            Self::Line { start, .. } => vec![*start],
            Self::Jump { target, .. } => vec![*target],
            Self::TableSwitch {
                default, targets, ..
            }
            | Self::LookupSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }
}
