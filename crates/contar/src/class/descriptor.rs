//! Type and method descriptors
//!
//! Descriptors use the compact JVM notation: `I` for int, `Ljava/lang/String;`
//! for an object type, `[I` for an array, `(II)V` for a method taking two ints
//! and returning nothing.

use std::fmt;

/// Separator of the legacy single-string method id
pub const METHOD_ID_SEPARATOR: &str = "/";

/// First protocol version that splits method ids into type tokens
pub const TOKENIZED_METHOD_ID_VERSION: u32 = 4;

/// A field or return type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// `V`
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `L<internal name>;`
    Object(String),
    /// `[<element>`
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Parse exactly one type descriptor
    #[must_use]
    pub fn parse(desc: &str) -> Option<Self> {
        match parse_type(desc.as_bytes(), 0) {
            Some((ty, end)) if end == desc.len() => Some(ty),
            _ => None,
        }
    }

    /// Descriptor form (`Ljava/lang/String;`)
    #[must_use]
    pub fn descriptor(&self) -> String {
        self.to_string()
    }

    /// Internal name: the class name for objects, the descriptor otherwise
    #[must_use]
    pub fn internal_name(&self) -> String {
        match self {
            Self::Object(name) => name.clone(),
            other => other.descriptor(),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("V"),
            Self::Boolean => f.write_str("Z"),
            Self::Byte => f.write_str("B"),
            Self::Char => f.write_str("C"),
            Self::Short => f.write_str("S"),
            Self::Int => f.write_str("I"),
            Self::Long => f.write_str("J"),
            Self::Float => f.write_str("F"),
            Self::Double => f.write_str("D"),
            Self::Object(name) => write!(f, "L{name};"),
            Self::Array(elem) => write!(f, "[{elem}"),
        }
    }
}

fn parse_type(bytes: &[u8], at: usize) -> Option<(TypeDesc, usize)> {
    let ty = match *bytes.get(at)? {
        b'V' => TypeDesc::Void,
        b'Z' => TypeDesc::Boolean,
        b'B' => TypeDesc::Byte,
        b'C' => TypeDesc::Char,
        b'S' => TypeDesc::Short,
        b'I' => TypeDesc::Int,
        b'J' => TypeDesc::Long,
        b'F' => TypeDesc::Float,
        b'D' => TypeDesc::Double,
        b'[' => {
            let (elem, end) = parse_type(bytes, at + 1)?;
            if elem == TypeDesc::Void {
                return None;
            }
            return Some((TypeDesc::Array(Box::new(elem)), end));
        }
        b'L' => {
            let rest = &bytes[at + 1..];
            let semi = rest.iter().position(|&b| b == b';')?;
            if semi == 0 {
                return None;
            }
            let name = std::str::from_utf8(&rest[..semi]).ok()?;
            return Some((TypeDesc::Object(name.to_string()), at + 1 + semi + 1));
        }
        _ => return None,
    };
    Some((ty, at + 1))
}

/// A parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDesc {
    /// Argument types in declaration order
    pub args: Vec<TypeDesc>,
    /// Return type
    pub ret: TypeDesc,
}

impl MethodDesc {
    /// Parse a method descriptor such as `(ILjava/lang/String;)V`
    #[must_use]
    pub fn parse(desc: &str) -> Option<Self> {
        let bytes = desc.as_bytes();
        if bytes.first() != Some(&b'(') {
            return None;
        }
        let mut at = 1;
        let mut args = Vec::new();
        while *bytes.get(at)? != b')' {
            let (ty, end) = parse_type(bytes, at)?;
            if ty == TypeDesc::Void {
                return None;
            }
            args.push(ty);
            at = end;
        }
        let (ret, end) = parse_type(bytes, at + 1)?;
        (end == bytes.len()).then_some(Self { args, ret })
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for arg in &self.args {
            write!(f, "{arg}")?;
        }
        write!(f, "){}", self.ret)
    }
}

/// Method id tokens for the given protocol version
///
/// Before version 4 the id is one combined string `name/desc`. From version 4
/// on it is `[name, return type, argument types...]` so overloads sharing a
/// name are told apart by their type tokens. Type tokens are descriptors, which
/// keeps the id reversible with [`desc_from_tokens`].
#[must_use]
pub fn method_id(name: &str, desc: &str, version: u32) -> Vec<String> {
    if version < TOKENIZED_METHOD_ID_VERSION {
        return vec![format!("{name}{METHOD_ID_SEPARATOR}{desc}")];
    }
    match MethodDesc::parse(desc) {
        Some(parsed) => std::iter::once(name.to_string())
            .chain(std::iter::once(parsed.ret.descriptor()))
            .chain(parsed.args.iter().map(TypeDesc::descriptor))
            .collect(),
        None => vec![name.to_string(), desc.to_string()],
    }
}

/// Split a method signature (`name` immediately followed by its descriptor)
#[must_use]
pub fn split_signature(signature: &str) -> Option<(&str, &str)> {
    let open = signature.find('(')?;
    Some((&signature[..open], &signature[open..]))
}

/// Rebuild `name + desc` from tokenized method id parts
#[must_use]
pub fn desc_from_tokens(tokens: &[String]) -> Option<String> {
    let (name, rest) = tokens.split_first()?;
    let (ret, args) = rest.split_first()?;
    let ret = TypeDesc::parse(ret)?;
    let args = args
        .iter()
        .map(|a| TypeDesc::parse(a))
        .collect::<Option<Vec<_>>>()?;
    Some(format!("{name}{}", MethodDesc { args, ret }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_desc() {
        let desc = MethodDesc::parse("(I[JLjava/lang/String;)Z").unwrap();
        assert_eq!(desc.args.len(), 3);
        assert_eq!(desc.args[1], TypeDesc::Array(Box::new(TypeDesc::Long)));
        assert_eq!(desc.args[2].internal_name(), "java/lang/String");
        assert_eq!(desc.ret, TypeDesc::Boolean);
        assert_eq!(desc.to_string(), "(I[JLjava/lang/String;)Z");
    }

    #[test]
    fn test_rejects_bad_descriptors() {
        assert!(MethodDesc::parse("I)V").is_none());
        assert!(MethodDesc::parse("(V)V").is_none());
        assert!(MethodDesc::parse("(L;)V").is_none());
        assert!(MethodDesc::parse("()V trailing").is_none());
        assert!(MethodDesc::parse("(Ljava/lang/String)V").is_none());
    }

    #[test]
    fn test_method_id_legacy() {
        assert_eq!(method_id("run", "(I)V", 3), vec!["run/(I)V".to_string()]);
    }

    #[test]
    fn test_method_id_tokenized_round_trip() {
        let tokens = method_id("valueOf", "(Ljava/lang/String;)La/Color;", 4);
        assert_eq!(tokens, vec!["valueOf", "La/Color;", "Ljava/lang/String;"]);
        assert_eq!(
            desc_from_tokens(&tokens).as_deref(),
            Some("valueOf(Ljava/lang/String;)La/Color;")
        );
    }

    #[test]
    fn test_split_signature() {
        assert_eq!(split_signature("main([Ljava/lang/String;)V"), Some(("main", "([Ljava/lang/String;)V")));
        assert_eq!(split_signature("broken"), None);
    }
}
