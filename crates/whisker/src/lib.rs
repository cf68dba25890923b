//! Whisker - a Mustache template compiler for Rust.
//!
//! Templates are scanned into a token tree, compiled to a compact
//! instruction stream and executed by a small render VM against a stack
//! of data frames.
//!
//! # Example
//!
//! ```
//! use whisker::{render, Value};
//!
//! let out = render("Hello {{planet}}!", Value::map([("planet", "World")])).unwrap();
//! assert_eq!(out, "Hello World!");
//! ```

use std::collections::HashMap;
use std::rc::Rc;

pub use whisker_bytecode as bytecode;
pub use whisker_compiler as compiler;
pub use whisker_parser as parser;
pub use whisker_scanner as scanner;
pub use whisker_vm as vm;

// Re-export commonly used types
pub use whisker_bytecode::{Code, Op};
pub use whisker_compiler::{Compiler, CompilerConfig, CompilerError};
pub use whisker_parser::{ParseError, ParseErrorKind, Parser, ParserConfig, Token};
pub use whisker_scanner::{Delimiters, Position};
pub use whisker_vm::{
    escape_html, EscapeMode, Host, Lambda, Object, Value, ValueMap, VMConfig, VMError, VM,
};

/// File extension hosts use when resolving partial names to files.
pub const DEFAULT_PARTIAL_EXT: &str = "mustache";

/// Error type for render operations.
#[derive(Debug)]
pub enum RenderError {
    Compile(CompilerError),
    Runtime(VMError),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Compile(e) => write!(f, "compile error: {}", e),
            RenderError::Runtime(e) => write!(f, "render error: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Compile(e) => Some(e),
            RenderError::Runtime(e) => Some(e),
        }
    }
}

impl From<CompilerError> for RenderError {
    fn from(e: CompilerError) -> Self {
        RenderError::Compile(e)
    }
}

impl From<VMError> for RenderError {
    fn from(e: VMError) -> Self {
        RenderError::Runtime(e)
    }
}

/// A compiled template, reusable across renders.
#[derive(Debug, Clone)]
pub struct Template {
    code: Rc<Code>,
}

impl Template {
    /// Compile template source.
    pub fn compile(source: &str) -> Result<Self, CompilerError> {
        Self::compile_named("", source)
    }

    /// Compile template source, recording `name` for diagnostics.
    pub fn compile_named(name: &str, source: &str) -> Result<Self, CompilerError> {
        let config = CompilerConfig {
            name: name.to_string(),
        };
        let code = whisker_compiler::compile(source, config)?;
        Ok(Self { code })
    }

    pub fn from_code(code: Rc<Code>) -> Self {
        Self { code }
    }

    pub fn code(&self) -> &Rc<Code> {
        &self.code
    }

    /// Render with no partials and the default configuration.
    pub fn render(&self, data: impl Into<Value>) -> Result<String, VMError> {
        self.render_with(data, &mut Partials::new(), VMConfig::default())
    }

    /// Render with a host and explicit configuration.
    pub fn render_with(
        &self,
        data: impl Into<Value>,
        host: &mut dyn Host,
        config: VMConfig,
    ) -> Result<String, VMError> {
        VM::new(config).render(&self.code, data.into(), host)
    }
}

/// In-memory partial store.
///
/// Partials are compiled on first use and cached by name.
#[derive(Debug, Default)]
pub struct Partials {
    sources: HashMap<String, String>,
    compiled: HashMap<String, Rc<Code>>,
    ambient: Option<Value>,
}

impl Partials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a partial.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        self.compiled.remove(&name);
        self.sources.insert(name, source.into());
    }

    /// Builder form of [`Partials::insert`].
    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Set a frame visible beneath every render's data.
    pub fn set_ambient(&mut self, ambient: impl Into<Value>) {
        self.ambient = Some(ambient.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Partials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut partials = Partials::new();
        for (name, source) in iter {
            partials.insert(name, source);
        }
        partials
    }
}

impl Host for Partials {
    fn partial(&mut self, name: &str) -> Result<Option<Rc<Code>>, VMError> {
        if let Some(code) = self.compiled.get(name) {
            return Ok(Some(code.clone()));
        }
        let Some(source) = self.sources.get(name) else {
            return Ok(None);
        };

        let config = CompilerConfig {
            name: name.to_string(),
        };
        let code = whisker_compiler::compile(source, config)
            .map_err(|e| VMError::new(format!("in partial {:?}: {}", name, e)))?;
        tracing::debug!(partial = name, "compiled partial");
        self.compiled.insert(name.to_string(), code.clone());
        Ok(Some(code))
    }

    fn compile(&mut self, source: &str, open: &str, close: &str) -> Result<Rc<Code>, VMError> {
        whisker_compiler::compile_with_delimiters(
            source,
            Delimiters::new(open, close),
            CompilerConfig::default(),
        )
        .map_err(|e| VMError::new(format!("in lambda output: {}", e)))
    }

    fn ambient(&self) -> Option<Value> {
        self.ambient.clone()
    }
}

/// Compile and render a template in a single call.
///
/// # Example
///
/// ```
/// use whisker::{render, Value};
///
/// let data = Value::map([("items", Value::list(["a", "b"]))]);
/// let out = render("{{#items}}{{.}} {{/items}}", data).unwrap();
/// assert_eq!(out, "a b ");
/// ```
pub fn render(source: &str, data: impl Into<Value>) -> Result<String, RenderError> {
    render_with_partials(source, data, &mut Partials::new())
}

/// Compile and render a template that may reference partials.
///
/// # Example
///
/// ```
/// use whisker::{render_with_partials, Partials, Value};
///
/// let mut partials = Partials::new().with("user", "<{{name}}>");
/// let out = render_with_partials("{{>user}}", Value::map([("name", "Ada")]), &mut partials).unwrap();
/// assert_eq!(out, "<Ada>");
/// ```
pub fn render_with_partials(
    source: &str,
    data: impl Into<Value>,
    partials: &mut Partials,
) -> Result<String, RenderError> {
    let template = Template::compile(source)?;
    let output = template.render_with(data, partials, VMConfig::default())?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_ok(source: &str, data: Value) -> String {
        render(source, data).unwrap_or_else(|e| panic!("render failed for {:?}: {}", source, e))
    }

    #[test]
    fn test_identity_without_tags() {
        for source in ["", "plain text", "line\n\nbreaks\r\n", "{ braces } and }}"] {
            assert_eq!(render_ok(source, Value::Null), source);
        }
    }

    #[test]
    fn test_hello_world() {
        let data = Value::map([("planet", "World")]);
        assert_eq!(render_ok("Hello {{planet}}!", data), "Hello World!");
    }

    #[test]
    fn test_template_reuse() {
        let template = Template::compile("{{n}};").unwrap();
        assert_eq!(template.render(Value::map([("n", 1)])).unwrap(), "1;");
        assert_eq!(template.render(Value::map([("n", 2)])).unwrap(), "2;");
    }

    #[test]
    fn test_compile_error() {
        match render("{{#a}}", Value::Null) {
            Err(RenderError::Compile(CompilerError::Parse(e))) => {
                assert_eq!(e.kind, ParseErrorKind::UnclosedSection { name: "a".to_string() });
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_error() {
        let mut partials = Partials::new().with("me", "{{>me}}");
        match render_with_partials("{{>me}}", Value::Null, &mut partials) {
            Err(RenderError::Runtime(e)) => assert!(e.to_string().contains("render depth exceeded")),
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_broken_partial_reports_name() {
        let mut partials = Partials::new().with("bad", "{{/x}}");
        let err = render_with_partials("{{>bad}}", Value::Null, &mut partials).unwrap_err();
        assert!(err.to_string().contains("in partial \"bad\""));
    }

    #[test]
    fn test_partials_cache() {
        let mut partials: Partials = [("a", "A")].into_iter().collect();
        let first = partials.partial("a").unwrap().unwrap();
        let second = partials.partial("a").unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        partials.insert("a", "B");
        let third = partials.partial("a").unwrap().unwrap();
        assert!(!Rc::ptr_eq(&first, &third));
        assert!(partials.partial("missing").unwrap().is_none());
    }

    #[test]
    fn test_ambient_frame() {
        let mut partials = Partials::new();
        partials.set_ambient(Value::map([("app", "whisker")]));
        let out = render_with_partials("{{app}}:{{page}}", Value::map([("page", "home")]), &mut partials)
            .unwrap();
        assert_eq!(out, "whisker:home");
    }

    #[test]
    fn test_custom_config() {
        let template = Template::compile("{{x}}").unwrap();
        let config = VMConfig {
            escape: EscapeMode::None,
            ..VMConfig::default()
        };
        let out = template
            .render_with(Value::map([("x", "<&>")]), &mut Partials::new(), config)
            .unwrap();
        assert_eq!(out, "<&>");
    }
}
