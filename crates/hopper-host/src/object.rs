use crate::runtime::ObjectRef;
use num::BigInt;
use std::fmt;

/// A dynamically typed value owned by the host runtime.
///
/// This is the engine's view of what the host hands over: scalars, the host
/// null, and containers whose elements are further host objects. Integers are
/// arbitrary-precision because the host's are; whether one fits the engine's
/// 64-bit slots is decided per row at encoding time. Anything the engine
/// cannot model is carried as [`HostObject::Opaque`] with its display form.
#[derive(Debug, Clone)]
pub enum HostObject {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(String),
    Tuple(Vec<ObjectRef>),
    List(Vec<ObjectRef>),
    Dict(Vec<(ObjectRef, ObjectRef)>),
    Opaque(String),
}

impl HostObject {
    pub fn is_none(&self) -> bool {
        matches!(self, HostObject::None)
    }

    /// Host-level name of the value's class, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostObject::None => "none",
            HostObject::Bool(_) => "bool",
            HostObject::Int(_) => "int",
            HostObject::Float(_) => "float",
            HostObject::Str(_) => "str",
            HostObject::Tuple(_) => "tuple",
            HostObject::List(_) => "list",
            HostObject::Dict(_) => "dict",
            HostObject::Opaque(_) => "object",
        }
    }
}

impl fmt::Display for HostObject {
    /// Display form of a host value. Containers render their element handles
    /// without dereferencing them, so this is safe to call without the
    /// runtime lock; use it for diagnostics only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostObject::None => write!(f, "None"),
            HostObject::Bool(true) => write!(f, "True"),
            HostObject::Bool(false) => write!(f, "False"),
            HostObject::Int(v) => write!(f, "{}", v),
            HostObject::Float(v) => write!(f, "{}", v),
            HostObject::Str(s) => write!(f, "{:?}", s),
            HostObject::Tuple(items) => write!(f, "<tuple of {} items>", items.len()),
            HostObject::List(items) => write!(f, "<list of {} items>", items.len()),
            HostObject::Dict(pairs) => write!(f, "<dict of {} entries>", pairs.len()),
            HostObject::Opaque(repr) => write!(f, "{}", repr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(HostObject::None.type_name(), "none");
        assert_eq!(HostObject::Bool(true).type_name(), "bool");
        assert_eq!(HostObject::Int(BigInt::from(3)).type_name(), "int");
        assert_eq!(HostObject::Str("x".to_string()).type_name(), "str");
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(HostObject::None.to_string(), "None");
        assert_eq!(HostObject::Bool(true).to_string(), "True");
        assert_eq!(HostObject::Int(BigInt::from(-5)).to_string(), "-5");
        assert_eq!(HostObject::Str("a\"b".to_string()).to_string(), "\"a\\\"b\"");
    }
}
