//! The Osprey value-type lattice and its compatibility predicates.
//!
//! Everything here is a pure function; the parser consults these for every
//! expression, assignment, condition and return it checks, and never bypasses
//! them.

use std::fmt;

use crate::frontend::token::{LiteralValue, TypeWord};

/// Type of a value flowing through an expression or stored in a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    None,
    Int,
    IntArray,
    Bool,
    BoolArray,
    Float,
    FloatArray,
    Str,
    StrArray,
}

impl ValueType {
    /// Type of a literal token.
    pub fn from_literal(lit: &LiteralValue) -> ValueType {
        match lit {
            LiteralValue::Int(_) => ValueType::Int,
            LiteralValue::Float(_) => ValueType::Float,
            LiteralValue::Str(_) => ValueType::Str,
            LiteralValue::True | LiteralValue::False => ValueType::Bool,
        }
    }

    /// Type denoted by a declaration's type word plus its array-ness.
    pub fn from_declared(base: TypeWord, is_array: bool) -> ValueType {
        match (base, is_array) {
            (TypeWord::Integer, false) => ValueType::Int,
            (TypeWord::Integer, true) => ValueType::IntArray,
            (TypeWord::Bool, false) => ValueType::Bool,
            (TypeWord::Bool, true) => ValueType::BoolArray,
            (TypeWord::Float, false) => ValueType::Float,
            (TypeWord::Float, true) => ValueType::FloatArray,
            (TypeWord::Str, false) => ValueType::Str,
            (TypeWord::Str, true) => ValueType::StrArray,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ValueType::IntArray | ValueType::BoolArray | ValueType::FloatArray | ValueType::StrArray
        )
    }

    /// Element type of an array type; `None` for non-arrays.
    pub fn element_type(self) -> ValueType {
        match self {
            ValueType::IntArray => ValueType::Int,
            ValueType::BoolArray => ValueType::Bool,
            ValueType::FloatArray => ValueType::Float,
            ValueType::StrArray => ValueType::Str,
            _ => ValueType::None,
        }
    }
}

/// Symmetric compatibility, used for assignments, conditions and relational
/// operands: identity, int↔bool, int↔float. Never across array-ness.
pub fn compatible(a: ValueType, b: ValueType) -> bool {
    a == b
        || (a == ValueType::Bool && b == ValueType::Int)
        || (a == ValueType::Int && b == ValueType::Bool)
        || (a == ValueType::Int && b == ValueType::Float)
        || (a == ValueType::Float && b == ValueType::Int)
}

/// Directional convertibility, used for return-value coercion: identity,
/// bool→int, int→bool, int→float. Note float→int is not convertible.
pub fn convertible(source: ValueType, dest: ValueType) -> bool {
    source == dest
        || (source == ValueType::Bool && dest == ValueType::Int)
        || (source == ValueType::Int && dest == ValueType::Bool)
        || (source == ValueType::Int && dest == ValueType::Float)
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::None => write!(f, "NONE"),
            ValueType::Int => write!(f, "INTEGER"),
            ValueType::IntArray => write!(f, "INTEGER array"),
            ValueType::Bool => write!(f, "BOOL"),
            ValueType::BoolArray => write!(f, "BOOL array"),
            ValueType::Float => write!(f, "FLOAT"),
            ValueType::FloatArray => write!(f, "FLOAT array"),
            ValueType::Str => write!(f, "STRING"),
            ValueType::StrArray => write!(f, "STRING array"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatible_is_symmetric() {
        let all = [
            ValueType::Int,
            ValueType::Bool,
            ValueType::Float,
            ValueType::Str,
            ValueType::IntArray,
            ValueType::BoolArray,
            ValueType::FloatArray,
            ValueType::StrArray,
        ];
        for a in all {
            for b in all {
                assert_eq!(compatible(a, b), compatible(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_compatible_pairs() {
        assert!(compatible(ValueType::Int, ValueType::Bool));
        assert!(compatible(ValueType::Int, ValueType::Float));
        assert!(compatible(ValueType::Str, ValueType::Str));
        assert!(!compatible(ValueType::Bool, ValueType::Float));
        assert!(!compatible(ValueType::Str, ValueType::Int));
        // Never across array-ness, even for the same element type.
        assert!(!compatible(ValueType::Int, ValueType::IntArray));
        assert!(!compatible(ValueType::IntArray, ValueType::FloatArray));
    }

    #[test]
    fn test_convertible_is_directional() {
        assert!(convertible(ValueType::Int, ValueType::Float));
        assert!(!convertible(ValueType::Float, ValueType::Int));
        assert!(convertible(ValueType::Bool, ValueType::Int));
        assert!(convertible(ValueType::Int, ValueType::Bool));
        assert!(!convertible(ValueType::Float, ValueType::Bool));
        assert!(!convertible(ValueType::Str, ValueType::Int));
    }

    #[test]
    fn test_element_type() {
        assert_eq!(ValueType::IntArray.element_type(), ValueType::Int);
        assert_eq!(ValueType::StrArray.element_type(), ValueType::Str);
        assert_eq!(ValueType::Int.element_type(), ValueType::None);
    }

    #[test]
    fn test_from_declared() {
        assert_eq!(ValueType::from_declared(TypeWord::Integer, false), ValueType::Int);
        assert_eq!(ValueType::from_declared(TypeWord::Integer, true), ValueType::IntArray);
        assert_eq!(ValueType::from_declared(TypeWord::Str, true), ValueType::StrArray);
    }
}
