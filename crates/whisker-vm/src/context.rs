//! Lookup context for rendering.
//!
//! The context is a stack of frames. Names resolve against the top-most
//! frame that defines them; dotted segments then resolve on the result.

use std::rc::Rc;

use crate::value::{Lambda, Value};

/// Stack of data frames a template renders against.
#[derive(Debug, Default)]
pub struct Context {
    frames: Vec<Value>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame.
    pub fn push(&mut self, frame: Value) {
        self.frames.push(frame);
    }

    /// Pop the top frame.
    pub fn pop(&mut self) -> Option<Value> {
        self.frames.pop()
    }

    /// Number of frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The top frame; the target of the implicit iterator.
    pub fn top(&self) -> Value {
        self.frames.last().cloned().unwrap_or(Value::Null)
    }

    /// Resolve a name against the frames from the top down.
    ///
    /// A frame that defines the name stops the search even when the stored
    /// value is null.
    pub fn fetch(&self, name: &str) -> Value {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| lookup(frame, name))
            .unwrap_or(Value::Null)
    }

    /// Resolve a name on a single value. Absent containers yield absent.
    pub fn find(container: &Value, name: &str) -> Value {
        lookup(container, name).unwrap_or(Value::Null)
    }
}

fn lookup(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Map(map) => map.get(name).cloned(),
        Value::Object(object) => object.get(name),
        Value::List(items) => name.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        _ => None,
    }
}

/// How a section treats the value it was opened with.
#[derive(Debug, Clone)]
pub enum SectionValue {
    /// Render nothing.
    Skip,
    /// Render the body once without pushing a frame.
    Once,
    /// Render the body once per element, each pushed as a frame.
    Iterate(Rc<Vec<Value>>),
    /// Render the body once with the value pushed as a frame.
    Push(Value),
    /// Hand the raw body to a callable.
    Lambda(Rc<Lambda>),
}

impl SectionValue {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Null | Value::Bool(false) => SectionValue::Skip,
            Value::Bool(true) => SectionValue::Once,
            Value::Lambda(lambda) => SectionValue::Lambda(lambda),
            Value::List(items) if items.is_empty() => SectionValue::Skip,
            Value::List(items) => SectionValue::Iterate(items),
            v if v.is_empty() => SectionValue::Skip,
            v => SectionValue::Push(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Value {
        Value::map([
            ("name", Value::from("Ada")),
            ("address", Value::map([("city", "London")])),
        ])
    }

    #[test]
    fn test_fetch_from_top_down() {
        let mut ctx = Context::new();
        ctx.push(Value::map([("name", "outer"), ("only_outer", "yes")]));
        ctx.push(Value::map([("name", "inner")]));

        assert_eq!(ctx.fetch("name").to_string(), "inner");
        assert_eq!(ctx.fetch("only_outer").to_string(), "yes");
        assert!(ctx.fetch("missing").is_null());

        ctx.pop();
        assert_eq!(ctx.fetch("name").to_string(), "outer");
    }

    #[test]
    fn test_defined_null_shadows_outer_frames() {
        let mut ctx = Context::new();
        ctx.push(Value::map([("name", "outer")]));
        ctx.push(Value::map([("name", Value::Null)]));
        assert!(ctx.fetch("name").is_null());
    }

    #[test]
    fn test_scalar_frames_are_skipped() {
        let mut ctx = Context::new();
        ctx.push(Value::map([("name", "outer")]));
        ctx.push(Value::from("a"));
        assert_eq!(ctx.fetch("name").to_string(), "outer");
        assert_eq!(ctx.top().to_string(), "a");
    }

    #[test]
    fn test_find() {
        let address = Context::find(&user(), "address");
        assert_eq!(Context::find(&address, "city").to_string(), "London");
        assert!(Context::find(&Value::Null, "city").is_null());
        assert!(Context::find(&Value::Int(3), "city").is_null());

        let list = Value::list(["x", "y"]);
        assert_eq!(Context::find(&list, "1").to_string(), "y");
        assert!(Context::find(&list, "5").is_null());
    }

    #[test]
    fn test_top_of_empty_context() {
        assert!(Context::new().top().is_null());
    }

    #[test]
    fn test_classify() {
        assert!(matches!(SectionValue::classify(Value::Null), SectionValue::Skip));
        assert!(matches!(SectionValue::classify(Value::Bool(false)), SectionValue::Skip));
        assert!(matches!(SectionValue::classify(Value::Bool(true)), SectionValue::Once));
        assert!(matches!(
            SectionValue::classify(Value::list(Vec::<Value>::new())),
            SectionValue::Skip
        ));
        assert!(matches!(
            SectionValue::classify(Value::list([1, 2])),
            SectionValue::Iterate(items) if items.len() == 2
        ));
        assert!(matches!(SectionValue::classify(Value::from("")), SectionValue::Skip));
        assert!(matches!(SectionValue::classify(Value::Int(0)), SectionValue::Push(_)));
        assert!(matches!(SectionValue::classify(user()), SectionValue::Push(_)));
        assert!(matches!(
            SectionValue::classify(Value::lambda(|| Value::Null)),
            SectionValue::Lambda(_)
        ));
    }
}
