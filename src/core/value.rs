//! Scalar and binding values.
//!
//! Move parameters carry `Scalar`s or arrays of them. Evaluation works on
//! `Value`, which adds token references (bound by `forEach` over a token
//! query) so token props can be read from the current state.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ids::TokenId;

/// A scalar value: integer, boolean or string (zone ids, enum literals,
/// token ids).
///
/// Human-readable formats see a bare JSON scalar; binary formats (bincode)
/// get an explicit variant tag since they cannot self-describe.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Scalar {
    /// Shorthand for a string scalar.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Short type label used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Serialize)]
enum TaggedScalarRef<'a> {
    Bool(bool),
    Int(i64),
    Str(&'a str),
}

#[derive(Deserialize)]
enum TaggedScalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                Self::Bool(b) => serializer.serialize_bool(*b),
                Self::Int(i) => serializer.serialize_i64(*i),
                Self::Str(s) => serializer.serialize_str(s),
            }
        } else {
            let tagged = match self {
                Self::Bool(b) => TaggedScalarRef::Bool(*b),
                Self::Int(i) => TaggedScalarRef::Int(*i),
                Self::Str(s) => TaggedScalarRef::Str(s),
            };
            tagged.serialize(serializer)
        }
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, integer or string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
        Ok(Scalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
        Ok(Scalar::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
        i64::try_from(v)
            .map(Scalar::Int)
            .map_err(|_| E::custom(format!("integer {v} out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
        Ok(Scalar::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
        Ok(Scalar::Str(v))
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(ScalarVisitor)
        } else {
            Ok(match TaggedScalar::deserialize(deserializer)? {
                TaggedScalar::Bool(b) => Self::Bool(b),
                TaggedScalar::Int(i) => Self::Int(i),
                TaggedScalar::Str(s) => Self::Str(s),
            })
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A move parameter value: one scalar or an array of scalars.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveParam {
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

impl MoveParam {
    /// The parameter viewed as a set of scalars (a scalar is a singleton).
    #[must_use]
    pub fn as_slice(&self) -> &[Scalar] {
        match self {
            Self::Scalar(s) => std::slice::from_ref(s),
            Self::Array(items) => items,
        }
    }
}

impl From<Scalar> for MoveParam {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Scalar>> for MoveParam {
    fn from(value: Vec<Scalar>) -> Self {
        Self::Array(value)
    }
}

/// A value produced by evaluation or held by a binding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Scalar>),
    Token(TokenId),
}

impl Value {
    /// Integer value shorthand.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }

    /// Boolean value shorthand.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }

    /// String value shorthand.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Str(value.into()))
    }

    /// The integer, if this is an integer scalar.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean scalar.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// The string form of a string scalar or token reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Str(s)) => Some(s),
            Self::Token(id) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Identity used for deduplication and domain membership.
    ///
    /// Token references compare by id, so a token chosen through a move
    /// parameter (a string) matches the same token in a query result.
    #[must_use]
    pub fn identity(&self) -> Option<Scalar> {
        match self {
            Self::Scalar(s) => Some(s.clone()),
            Self::Token(id) => Some(Scalar::Str(id.0.clone())),
            Self::Array(_) => None,
        }
    }

    /// Short type label used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.type_name(),
            Self::Array(_) => "array",
            Self::Token(_) => "token",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Token(id) => write!(f, "{id}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<MoveParam> for Value {
    fn from(param: MoveParam) -> Self {
        match param {
            MoveParam::Scalar(s) => Self::Scalar(s),
            MoveParam::Array(items) => Self::Array(items),
        }
    }
}
