//! Property access on application objects
//!
//! Three ways to make a type reachable from an expression:
//!
//! - `#[derive(Accessible)]` for struct fields and listed zero-argument methods
//! - an [`AccessorTable`] of closures, bound to a value with [`Registered`]
//! - a hand-written [`Accessible`] impl

use super::Value;
use crate::error::StowageResult;
use convert_case::{Case, Casing};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An object whose methods and fields can be reached from expressions
///
/// `call` and `field` return `None` when the member does not exist, so the
/// resolver can move on to the next candidate.
pub trait Accessible: Send + Sync {
    /// Type name used in error messages
    fn type_name(&self) -> &'static str;

    /// Invokes the method `name` with positional string arguments
    fn call(&self, _name: &str, _args: &[String]) -> Option<StowageResult<Value>> {
        None
    }

    /// Reads the public field `name`
    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// String form used when the object itself is substituted
    fn display(&self) -> Option<String> {
        None
    }
}

/// Looks up `segment` on `object`
///
/// Candidates are tried in order: method `segment`, methods `get_<segment>`,
/// `has_<segment>` and `is_<segment>` (segment in snake case), then field
/// `segment`. Arguments are only passed to methods.
pub fn get_property(
    object: &dyn Accessible,
    segment: &str,
    args: &[String],
) -> Option<StowageResult<Value>> {
    let snake = segment.to_case(Case::Snake);

    let mut methods = vec![segment.to_string()];
    if snake != segment {
        methods.push(snake.clone());
    }
    methods.extend(["get", "has", "is"].iter().map(|prefix| format!("{prefix}_{snake}")));

    methods
        .iter()
        .find_map(|name| object.call(name, args))
        .or_else(|| {
            object
                .field(segment)
                .or_else(|| object.field(&snake))
                .map(Ok)
        })
}

type MethodFn<T> = Arc<dyn Fn(&T, &[String]) -> StowageResult<Value> + Send + Sync>;
type FieldFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type DisplayFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Per-type table of accessor closures, built once at configuration time
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use stowage::value::{AccessorTable, Value};
///
/// struct Article {
///     id: u32,
///     title: String,
/// }
///
/// let table = Arc::new(
///     AccessorTable::new("Article")
///         .field("id", |a: &Article| Value::from(a.id))
///         .method("title", |a: &Article, _args| Ok(Value::from(a.title.clone()))),
/// );
///
/// let article = AccessorTable::bind(&table, Article { id: 1, title: "Hi".into() });
/// let value = Value::object(article);
/// # let _ = value;
/// ```
pub struct AccessorTable<T> {
    type_name: &'static str,
    methods: HashMap<String, MethodFn<T>>,
    fields: HashMap<String, FieldFn<T>>,
    display: Option<DisplayFn<T>>,
}

impl<T> AccessorTable<T> {
    /// Creates an empty table for the type called `type_name`
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            methods: HashMap::new(),
            fields: HashMap::new(),
            display: None,
        }
    }

    /// Registers a method receiving positional arguments
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T, &[String]) -> StowageResult<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    /// Registers a readable field
    #[must_use]
    pub fn field<F>(mut self, name: impl Into<String>, field: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.fields.insert(name.into(), Arc::new(field));
        self
    }

    /// Registers the string form of the object
    #[must_use]
    pub fn display<F>(mut self, display: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.display = Some(Arc::new(display));
        self
    }

    /// Pairs `value` with this table
    #[must_use]
    pub fn bind(table: &Arc<Self>, value: T) -> Registered<T> {
        Registered {
            value,
            table: Arc::clone(table),
        }
    }
}

impl<T> fmt::Debug for AccessorTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        let mut fields: Vec<&String> = self.fields.keys().collect();
        fields.sort();
        f.debug_struct("AccessorTable")
            .field("type_name", &self.type_name)
            .field("methods", &methods)
            .field("fields", &fields)
            .finish_non_exhaustive()
    }
}

/// A value bound to its [`AccessorTable`]
pub struct Registered<T> {
    value: T,
    table: Arc<AccessorTable<T>>,
}

impl<T> Registered<T> {
    /// The wrapped value
    pub const fn inner(&self) -> &T {
        &self.value
    }
}

impl<T: Send + Sync> Accessible for Registered<T> {
    fn type_name(&self) -> &'static str {
        self.table.type_name
    }

    fn call(&self, name: &str, args: &[String]) -> Option<StowageResult<Value>> {
        self.table
            .methods
            .get(name)
            .map(|method| method(&self.value, args))
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.table.fields.get(name).map(|field| field(&self.value))
    }

    fn display(&self) -> Option<String> {
        self.table.display.as_ref().map(|display| display(&self.value))
    }
}
