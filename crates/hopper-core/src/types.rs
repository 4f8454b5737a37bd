use itertools::Itertools;
use std::fmt;

/// A value in the engine's type lattice.
///
/// Row types are always tuples; every other variant can appear as a field
/// type. The lattice is deliberately small: it only has to describe the
/// normal-case shape of a sampled input column, not a full host type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Bottom value, only used as an initializer before inference has run.
    Unknown,
    Bool,
    I64,
    F64,
    Str,
    /// The unit null type. `Null` is a value of `Option(T)` for every `T`.
    Null,
    /// An opaque host object the engine does not model any further.
    Any,
    /// Nullable wrapper around another type.
    Option(Box<Type>),
    /// Ordered, fixed-arity product type.
    Tuple(Vec<Type>),
    /// Homogeneous sequence.
    List(Box<Type>),
    /// Mapping with unified key and value types.
    Dict(Box<Type>, Box<Type>),
    /// A mapping with no entries, so no key/value types to speak of.
    EmptyDict,
    /// A mapping whose key or value types could not be unified.
    GenericDict,
}

impl Type {
    /// Build a tuple type from field types.
    pub fn make_tuple(params: Vec<Type>) -> Type {
        Type::Tuple(params)
    }

    /// Wrap a type in an option. Options do not nest, so wrapping an option
    /// returns it unchanged.
    pub fn make_option(inner: Type) -> Type {
        if inner.is_option() {
            inner
        } else {
            Type::Option(Box::new(inner))
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Type::Option(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Type::Tuple(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Type::List(_))
    }

    /// True for every mapping form, including the empty and generic ones.
    pub fn is_dict(&self) -> bool {
        matches!(self, Type::Dict(_, _) | Type::EmptyDict | Type::GenericDict)
    }

    /// The element type of an option, if this is one.
    pub fn inner(&self) -> Option<&Type> {
        match self {
            Type::Option(t) => Some(t),
            _ => None,
        }
    }

    /// Tuple field types; empty for non-tuples.
    pub fn params(&self) -> &[Type] {
        match self {
            Type::Tuple(params) => params,
            _ => &[],
        }
    }

    /// The key type of a concrete mapping type.
    pub fn key_type(&self) -> Option<&Type> {
        match self {
            Type::Dict(k, _) => Some(k),
            _ => None,
        }
    }

    /// The value type of a concrete mapping type.
    pub fn value_type(&self) -> Option<&Type> {
        match self {
            Type::Dict(_, v) => Some(v),
            _ => None,
        }
    }

    /// The element type of a list.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(t) => Some(t),
            _ => None,
        }
    }

    /// True when every tuple field is a simple scalar (bool, i64, f64, str),
    /// which is what the specialized row encoders can handle.
    pub fn is_simple_scalar_tuple(&self) -> bool {
        match self {
            Type::Tuple(params) => {
                !params.is_empty()
                    && params
                        .iter()
                        .all(|p| matches!(p, Type::Bool | Type::I64 | Type::F64 | Type::Str))
            }
            _ => false,
        }
    }

    /// Structural ordering used to rank sampled types: `self ⊑ other` when a
    /// value of `self` could be read as a value of `other`. Covers the numeric
    /// tower (bool ⊑ i64 ⊑ f64), option lifting, and componentwise lifting
    /// through tuples and lists.
    pub fn is_subclass(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Bool, Type::I64) | (Type::Bool, Type::F64) | (Type::I64, Type::F64) => true,
            (Type::Null, Type::Option(_)) => true,
            (t, Type::Option(inner)) => t.is_subclass(inner),
            (Type::EmptyDict, Type::Dict(_, _)) | (Type::EmptyDict, Type::GenericDict) => true,
            (Type::Dict(_, _), Type::GenericDict) => true,
            (Type::List(a), Type::List(b)) => a.is_subclass(b),
            (Type::Tuple(a), Type::Tuple(b)) if a.len() == b.len() => {
                a.iter().zip(b.iter()).all(|(x, y)| x.is_subclass(y))
            }
            _ => false,
        }
    }

    /// The option-specific subtype relation used to accept rows against a
    /// normal-case type: reflexive, `T ⊑ Option(T)`, `Null ⊑ Option(T)`, and
    /// lifted componentwise through equal-arity tuples. Unlike
    /// [`Type::is_subclass`] this performs no numeric widening, so it is the
    /// right test for "can this value be stored in a slot of that type as-is".
    pub fn is_sub_option(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        if let Type::Option(inner) = other {
            if self == inner.as_ref() || *self == Type::Null {
                return true;
            }
        }
        if let (Type::Tuple(a), Type::Tuple(b)) = (self, other) {
            if a.len() == b.len() {
                return a.iter().zip(b.iter()).all(|(x, y)| x.is_sub_option(y));
            }
        }
        false
    }

    /// Least upper bound of two types under option lifting, when one exists.
    ///
    /// `t ⊔ t = t`, `T ⊔ Null = Option(T)`, `Option(T) ⊔ T = Option(T)`, and
    /// componentwise on equal-arity tuples. Commutative; returns `None` when
    /// the two types cannot share an option-lifted supertype.
    pub fn super_option(&self, other: &Type) -> Option<Type> {
        if self == other {
            return Some(self.clone());
        }
        if let Type::Option(inner) = self {
            if inner.as_ref() == other || *other == Type::Null {
                return Some(self.clone());
            }
        }
        if let Type::Option(inner) = other {
            if inner.as_ref() == self || *self == Type::Null {
                return Some(other.clone());
            }
        }
        if *self == Type::Null {
            return Some(Type::make_option(other.clone()));
        }
        if *other == Type::Null {
            return Some(Type::make_option(self.clone()));
        }
        if let (Type::Tuple(a), Type::Tuple(b)) = (self, other) {
            if a.len() == b.len() {
                let params = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.super_option(y))
                    .collect::<Option<Vec<_>>>()?;
                return Some(Type::Tuple(params));
            }
        }
        None
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "unknown"),
            Type::Bool => write!(f, "bool"),
            Type::I64 => write!(f, "i64"),
            Type::F64 => write!(f, "f64"),
            Type::Str => write!(f, "str"),
            Type::Null => write!(f, "null"),
            Type::Any => write!(f, "any"),
            Type::Option(inner) => write!(f, "Option[{}]", inner),
            Type::Tuple(params) => write!(f, "({})", params.iter().join(",")),
            Type::List(elem) => write!(f, "[{}]", elem),
            Type::Dict(k, v) => write!(f, "{{{}: {}}}", k, v),
            Type::EmptyDict => write!(f, "{{}}"),
            Type::GenericDict => write!(f, "dict"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(t: Type) -> Type {
        Type::make_option(t)
    }

    #[test]
    fn test_sub_option_reflexive() {
        for t in [
            Type::Bool,
            Type::I64,
            Type::Str,
            Type::Null,
            opt(Type::I64),
            Type::make_tuple(vec![Type::I64, Type::Str]),
        ] {
            assert!(t.is_sub_option(&t));
        }
    }

    #[test]
    fn test_sub_option_lifting() {
        assert!(Type::I64.is_sub_option(&opt(Type::I64)));
        assert!(Type::Null.is_sub_option(&opt(Type::Str)));
        assert!(!opt(Type::I64).is_sub_option(&Type::I64));
        assert!(!Type::I64.is_sub_option(&opt(Type::Str)));
    }

    #[test]
    fn test_sub_option_through_tuples() {
        let plain = Type::make_tuple(vec![Type::I64, Type::Null]);
        let lifted = Type::make_tuple(vec![opt(Type::I64), opt(Type::I64)]);
        assert!(plain.is_sub_option(&lifted));
        assert!(!lifted.is_sub_option(&plain));

        let shorter = Type::make_tuple(vec![Type::I64]);
        assert!(!shorter.is_sub_option(&lifted));
    }

    #[test]
    fn test_sub_option_no_numeric_widening() {
        assert!(!Type::Bool.is_sub_option(&Type::I64));
        assert!(!Type::I64.is_sub_option(&Type::F64));
    }

    #[test]
    fn test_subclass_numeric_tower() {
        assert!(Type::Bool.is_subclass(&Type::I64));
        assert!(Type::Bool.is_subclass(&Type::F64));
        assert!(Type::I64.is_subclass(&Type::F64));
        assert!(!Type::F64.is_subclass(&Type::I64));
        assert!(!Type::Str.is_subclass(&Type::F64));
    }

    #[test]
    fn test_super_option_commutative() {
        let cases = [
            (Type::I64, Type::Null),
            (Type::Null, opt(Type::Str)),
            (
                Type::make_tuple(vec![Type::I64, Type::Null]),
                Type::make_tuple(vec![Type::Null, Type::I64]),
            ),
        ];
        for (a, b) in cases {
            assert_eq!(a.super_option(&b), b.super_option(&a));
        }
    }

    #[test]
    fn test_super_option_covers_both_arguments() {
        let a = Type::make_tuple(vec![Type::I64, Type::Null]);
        let b = Type::make_tuple(vec![Type::Null, Type::I64]);
        let s = a.super_option(&b).unwrap();
        assert_eq!(
            s,
            Type::make_tuple(vec![opt(Type::I64), opt(Type::I64)])
        );
        assert!(a.is_sub_option(&s));
        assert!(b.is_sub_option(&s));
    }

    #[test]
    fn test_super_option_undefined() {
        assert!(Type::I64.super_option(&Type::Str).is_none());
        let pair = Type::make_tuple(vec![Type::I64, Type::I64]);
        let single = Type::make_tuple(vec![Type::I64]);
        assert!(pair.super_option(&single).is_none());
    }

    #[test]
    fn test_option_does_not_nest() {
        assert_eq!(opt(opt(Type::I64)), opt(Type::I64));
    }

    #[test]
    fn test_simple_scalar_tuple() {
        assert!(Type::make_tuple(vec![Type::I64, Type::Str]).is_simple_scalar_tuple());
        assert!(!Type::make_tuple(vec![Type::I64, opt(Type::Str)]).is_simple_scalar_tuple());
        assert!(!Type::make_tuple(vec![]).is_simple_scalar_tuple());
        assert!(!Type::I64.is_simple_scalar_tuple());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Type::make_tuple(vec![Type::I64, opt(Type::Str)]).to_string(),
            "(i64,Option[str])"
        );
        assert_eq!(Type::List(Box::new(Type::F64)).to_string(), "[f64]");
        assert_eq!(
            Type::Dict(Box::new(Type::Str), Box::new(Type::I64)).to_string(),
            "{str: i64}"
        );
    }
}
