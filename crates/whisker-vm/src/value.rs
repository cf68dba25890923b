//! Whisker value system - data that templates render.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Keyed frame contents.
pub type ValueMap = HashMap<String, Value>;

/// Runtime values a template can look up.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<ValueMap>),
    Lambda(Rc<Lambda>),
    Object(Rc<dyn Object>),
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K, V, I>(pairs: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: ValueMap = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::Map(Rc::new(map))
    }

    /// Build a list value.
    pub fn list<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Wrap a zero-argument callable.
    pub fn lambda(f: impl Fn() -> Value + 'static) -> Value {
        Value::Lambda(Rc::new(Lambda::new(f)))
    }

    /// Wrap a callable that receives a section's raw text.
    pub fn section_lambda(f: impl Fn(&str) -> Value + 'static) -> Value {
        Value::Lambda(Rc::new(Lambda::section(f)))
    }

    /// Get the type name of this value.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Lambda(_) => "lambda",
            Value::Object(o) => o.type_name(),
        }
    }

    /// Check if the value is an empty string, list, map or object.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Check if an inverted section over this value renders its body.
    pub fn is_falsy_or_empty(&self) -> bool {
        match self {
            Value::Null | Value::Bool(false) => true,
            Value::Lambda(_) => false,
            v => v.is_empty(),
        }
    }

    /// Check if this is the absent value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let pairs: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{}: {}", k, map[k]))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::Lambda(_) => write!(f, "<lambda>"),
            Value::Object(o) => write!(f, "{}", o.to_text()),
        }
    }
}

/// Host data that resolves names itself instead of being a plain map.
pub trait Object: fmt::Debug {
    /// Get the type name, used in diagnostics.
    fn type_name(&self) -> &str {
        "object"
    }

    /// Look up an attribute by name.
    fn get(&self, name: &str) -> Option<Value>;

    /// Report emptiness for section truthiness.
    fn is_empty(&self) -> bool {
        false
    }

    /// String form used when the object itself is interpolated.
    fn to_text(&self) -> String {
        format!("<{}>", self.type_name())
    }
}

/// Zero-argument callable signature.
pub type LambdaFn = Box<dyn Fn() -> Value>;

/// Section callable signature; receives the unparsed section body.
pub type SectionLambdaFn = Box<dyn Fn(&str) -> Value>;

enum LambdaKind {
    Plain(LambdaFn),
    Section(SectionLambdaFn),
}

/// Host callable stored in a value.
pub struct Lambda {
    kind: LambdaKind,
}

impl Lambda {
    pub fn new(f: impl Fn() -> Value + 'static) -> Self {
        Self {
            kind: LambdaKind::Plain(Box::new(f)),
        }
    }

    pub fn section(f: impl Fn(&str) -> Value + 'static) -> Self {
        Self {
            kind: LambdaKind::Section(Box::new(f)),
        }
    }

    /// Invoke without section text, as a value tag does.
    pub fn call(&self) -> Value {
        match &self.kind {
            LambdaKind::Plain(f) => f(),
            LambdaKind::Section(f) => f(""),
        }
    }

    /// Invoke with a section's raw body text.
    pub fn call_section(&self, raw: &str) -> Value {
        match &self.kind {
            LambdaKind::Plain(f) => f(),
            LambdaKind::Section(f) => f(raw),
        }
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LambdaKind::Plain(_) => write!(f, "Lambda"),
            LambdaKind::Section(_) => write!(f, "Lambda(section)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(Rc::new(map))
    }
}

impl From<Lambda> for Value {
    fn from(lambda: Lambda) -> Self {
        Value::Lambda(Rc::new(lambda))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s.into()),
            Json::Array(items) => Value::list(items),
            Json::Object(map) => Value::map(map),
        }
    }
}
