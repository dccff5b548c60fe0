//! Context values handed to namers and path generators
//!
//! A [`Context`] maps names to [`Value`]s. Values are plain data (scalars,
//! lists, maps) or application objects exposed through [`Accessible`], so
//! expressions such as `{this.slug}` can reach into them without runtime
//! reflection.

mod accessor;

pub use accessor::{get_property, Accessible, AccessorTable, Registered};

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name to value map
pub type Context = BTreeMap<String, Value>;

/// A value stored in a [`Context`]
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value, renders as the empty string
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// Nested map
    Map(Context),
    /// Application object
    Object(Arc<dyn Accessible>),
}

impl Value {
    /// Wraps an application object
    pub fn object(object: impl Accessible + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Renders the value for substitution into a path
    ///
    /// Returns `None` for lists, maps and objects without a string form.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => Some(String::new()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::List(_) | Self::Map(_) => None,
            Self::Object(object) => object.display(),
        }
    }

    /// Short type name used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(object) => object.type_name(),
        }
    }

    /// Whether the value is [`Value::Null`]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Object(object) => write!(f, "Object({})", object.type_name()),
        }
    }
}

/// Structural equality; objects compare by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Objects serialize as their string form, or `null` without one
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Self::Object(object) => match object.display() {
                Some(s) => serializer.serialize_str(&s),
                None => serializer.serialize_unit(),
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Int)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Int)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<Context> for Value {
    fn from(value: Context) -> Self {
        Self::Map(value)
    }
}

impl From<Arc<dyn Accessible>> for Value {
    fn from(value: Arc<dyn Accessible>) -> Self {
        Self::Object(value)
    }
}

/// Converts a field or method result into a [`Value`] by reference
///
/// Used by `#[derive(Accessible)]`; implemented for everything that
/// converts into a [`Value`] and can be cloned.
pub trait ToValue {
    /// Converts `self` into a value
    fn to_value(&self) -> Value;
}

impl<T: Clone + Into<Value>> ToValue for T {
    fn to_value(&self) -> Value {
        self.clone().into()
    }
}

/// Builds a [`Context`] from `key => value` pairs
///
/// # Examples
///
/// ```rust
/// use stowage::context;
///
/// let ctx = context! { "objectId" => 1, "title" => "Hello" };
/// assert_eq!(ctx.len(), 2);
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::value::Context::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::value::Context::new();
        $(
            ctx.insert(::std::string::String::from($key), $crate::value::Value::from($value));
        )+
        ctx
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::Null.render().as_deref(), Some(""));
        assert_eq!(Value::from(true).render().as_deref(), Some("true"));
        assert_eq!(Value::from(42).render().as_deref(), Some("42"));
        assert_eq!(Value::from(1.5).render().as_deref(), Some("1.5"));
        assert_eq!(Value::from("x").render().as_deref(), Some("x"));
    }

    #[test]
    fn test_render_rejects_containers() {
        assert!(Value::from(vec![1, 2]).render().is_none());
        assert!(Value::Map(Context::new()).render().is_none());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"id": 7, "tags": ["a"], "ratio": 0.5, "none": null}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["id"], Value::Int(7));
        assert_eq!(map["tags"], Value::List(vec![Value::from("a")]));
        assert_eq!(map["ratio"], Value::Float(0.5));
        assert!(map["none"].is_null());
    }

    #[test]
    fn test_serialize_round_trip_to_json() {
        let ctx = context! { "id" => 3, "name" => "x" };
        let json = serde_json::to_value(Value::Map(ctx)).unwrap();
        assert_eq!(json, json!({"id": 3, "name": "x"}));
    }

    #[test]
    fn test_option_conversion() {
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::from(Some("a")), Value::from("a"));
    }

    #[test]
    fn test_large_unsigned_falls_back_to_string() {
        assert_eq!(Value::from(u64::MAX), Value::String(u64::MAX.to_string()));
    }
}
