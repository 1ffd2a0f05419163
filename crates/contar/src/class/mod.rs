//! Compiled class input model
//!
//! The class-loading infrastructure hands over a class as raw bytes; those
//! bytes are the encoded form of a [`ClassFile`]. Only the metadata the filter
//! chain and the instrumenter consult is modelled: access flags, annotations,
//! local variable names and the instruction stream of every method.

mod codec;
pub mod descriptor;
mod insn;

pub use insn::{ArithOp, FieldOp, Insn, JumpCond, Label, Probe, ReturnKind};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class and method access flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct AccessFlags(u16);

impl AccessFlags {
    /// `public`
    pub const PUBLIC: Self = Self(0x0001);
    /// `private`
    pub const PRIVATE: Self = Self(0x0002);
    /// `static`
    pub const STATIC: Self = Self(0x0008);
    /// `final`
    pub const FINAL: Self = Self(0x0010);
    /// Bridge method generated for generic overriding
    pub const BRIDGE: Self = Self(0x0040);
    /// Interface type
    pub const INTERFACE: Self = Self(0x0200);
    /// `abstract`
    pub const ABSTRACT: Self = Self(0x0400);
    /// Compiler generated
    pub const SYNTHETIC: Self = Self(0x1000);
    /// Annotation type
    pub const ANNOTATION: Self = Self(0x2000);
    /// Enum type
    pub const ENUM: Self = Self(0x4000);

    /// No flags
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Build from raw bits
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Whether all flags in `other` are set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Annotation element value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationValue {
    /// Enum constant
    Enum {
        /// Enum type descriptor
        desc: String,
        /// Constant name
        value: String,
    },
    /// String constant
    Str(String),
    /// Integer constant
    Int(i64),
}

/// Annotation attached to a class or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation type descriptor, e.g. `Lkotlin/Deprecated;`
    pub desc: String,
    /// Named element values
    pub values: Vec<(String, AnnotationValue)>,
}

impl Annotation {
    /// Annotation without element values
    #[must_use]
    pub fn marker(desc: &str) -> Self {
        Self {
            desc: desc.to_string(),
            values: Vec::new(),
        }
    }

    /// Add an enum element value
    #[must_use]
    pub fn with_enum(mut self, name: &str, desc: &str, value: &str) -> Self {
        self.values.push((
            name.to_string(),
            AnnotationValue::Enum {
                desc: desc.to_string(),
                value: value.to_string(),
            },
        ));
        self
    }
}

/// Debug name of a local variable slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariable {
    /// Variable name
    pub name: String,
    /// Type descriptor
    pub desc: String,
    /// Slot index
    pub index: u16,
}

/// Identity of a method inside its class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
}

impl MethodKey {
    /// Create a key
    #[must_use]
    pub fn new(name: &str, desc: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }

    /// `name` immediately followed by the descriptor
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.desc)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.desc)
    }
}

/// One method of a compiled class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodNode {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
    /// Generic signature, if any
    pub signature: Option<String>,
    /// Access flags
    pub access: AccessFlags,
    /// Method annotations
    pub annotations: Vec<Annotation>,
    /// Local variable debug names
    pub local_variables: Vec<LocalVariable>,
    /// Instruction stream
    pub instructions: Vec<Insn>,
}

impl MethodNode {
    /// Create a method with no flags, annotations or code
    #[must_use]
    pub fn new(name: &str, desc: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
            signature: None,
            access: AccessFlags::empty(),
            annotations: Vec::new(),
            local_variables: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Set the instruction stream
    #[must_use]
    pub fn with_code(mut self, instructions: Vec<Insn>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Set the access flags
    #[must_use]
    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Add an annotation
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Set the generic signature
    #[must_use]
    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// Add a local variable debug entry
    #[must_use]
    pub fn with_local(mut self, name: &str, desc: &str, index: u16) -> Self {
        self.local_variables.push(LocalVariable {
            name: name.to_string(),
            desc: desc.to_string(),
            index,
        });
        self
    }

    /// Key of this method
    #[must_use]
    pub fn key(&self) -> MethodKey {
        MethodKey::new(&self.name, &self.desc)
    }

    /// Whether the method carries an annotation with the given descriptor
    #[must_use]
    pub fn has_annotation(&self, desc: &str) -> bool {
        self.annotations.iter().any(|a| a.desc == desc)
    }

    /// One past the highest label number used in the body
    #[must_use]
    pub fn next_free_label(&self) -> u32 {
        self.instructions
            .iter()
            .flat_map(|insn| match insn {
                Insn::Label(label) => vec![*label],
                other => other.referenced_labels(),
            })
            .map(|l| l.as_u32().saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}

/// A compiled class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFile {
    /// Internal (slash separated) name
    pub name: String,
    /// Access flags
    pub access: AccessFlags,
    /// Internal name of the superclass
    pub super_name: Option<String>,
    /// Class annotations
    pub annotations: Vec<Annotation>,
    /// Methods in declaration order
    pub methods: Vec<MethodNode>,
}

impl ClassFile {
    /// Create an empty class
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: AccessFlags::PUBLIC,
            super_name: Some("java/lang/Object".to_string()),
            annotations: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the access flags
    #[must_use]
    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Add a class annotation
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Add a method
    #[must_use]
    pub fn with_method(mut self, method: MethodNode) -> Self {
        self.methods.push(method);
        self
    }

    /// Dotted class name (`a.b.C`)
    #[must_use]
    pub fn dotted_name(&self) -> String {
        self.name.replace('/', ".")
    }

    /// Whether the class carries an annotation with the given descriptor
    #[must_use]
    pub fn has_annotation(&self, desc: &str) -> bool {
        self.annotations.iter().any(|a| a.desc == desc)
    }

    /// Enum types have the enum flag and extend `java/lang/Enum`
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.access.contains(AccessFlags::ENUM)
            && self.super_name.as_deref() == Some("java/lang/Enum")
    }
}
