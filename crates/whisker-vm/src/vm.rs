//! Whisker Virtual Machine - render code execution engine.

use std::rc::Rc;

use thiserror::Error;
use whisker_bytecode::{Code, Op, SectionInfo, SourceLocation};

use crate::buffer::{EscapeMode, OutputBuffer};
use crate::context::{Context, SectionValue};
use crate::frame::Frame;
use crate::value::Value;

/// Default limit on nested partial and lambda renders.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// VM execution error.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct VMError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl VMError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Attach a location unless a more precise one is already set.
    fn or_location(mut self, location: Option<SourceLocation>) -> Self {
        if self.line.is_none() {
            if let Some(location) = location {
                self.line = Some(location.line);
                self.column = Some(location.column);
            }
        }
        self
    }
}

/// VM configuration options.
#[derive(Debug, Clone)]
pub struct VMConfig {
    /// Escaping applied to `{{name}}` output.
    pub escape: EscapeMode,
    /// Maximum nesting of partial and lambda renders.
    pub max_depth: usize,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            escape: EscapeMode::Html,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Capabilities the embedding application provides to a render.
pub trait Host {
    /// Resolve a partial by name. `None` renders nothing.
    fn partial(&mut self, name: &str) -> Result<Option<Rc<Code>>, VMError>;

    /// Compile lambda output under the given delimiters.
    fn compile(&mut self, source: &str, open: &str, close: &str) -> Result<Rc<Code>, VMError>;

    /// Bottom context frame shared by every render.
    fn ambient(&self) -> Option<Value> {
        None
    }
}

/// Whisker Virtual Machine.
pub struct VM {
    config: VMConfig,
    /// Lookup frames.
    context: Context,
    /// Value stack for lookups awaiting output.
    stack: Vec<Value>,
    /// Current partial/lambda nesting.
    depth: usize,
}

impl VM {
    /// Create a new VM.
    pub fn new(config: VMConfig) -> Self {
        Self {
            config,
            context: Context::new(),
            stack: Vec::new(),
            depth: 0,
        }
    }

    pub fn config(&self) -> &VMConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Render code against `data` and return the output.
    pub fn render(&mut self, code: &Code, data: Value, host: &mut dyn Host) -> Result<String, VMError> {
        // Reset state
        self.context = Context::new();
        self.stack.clear();
        self.depth = 0;

        if let Some(ambient) = host.ambient() {
            self.context.push(ambient);
        }
        self.context.push(data);

        let mut buffer = OutputBuffer::new(self.config.escape);
        self.render_into(code, host, &mut buffer)?;
        Ok(buffer.into_string())
    }

    /// Execute code against the current context, appending to `buffer`.
    pub fn render_into(
        &mut self,
        code: &Code,
        host: &mut dyn Host,
        buffer: &mut OutputBuffer,
    ) -> Result<(), VMError> {
        self.execute(code, host, buffer)
    }

    /// Main execution loop for one block.
    fn execute(&mut self, code: &Code, host: &mut dyn Host, buffer: &mut OutputBuffer) -> Result<(), VMError> {
        let mut frame = Frame::new(code);
        while !frame.is_at_end() {
            let ip = frame.ip;
            let word = frame.read_op();
            let Some(op) = Op::from_u16(word) else {
                unreachable!("invalid opcode {} at {} in {:?}", word, ip, code.name);
            };
            if op == Op::Halt {
                break;
            }
            self.step(op, &mut frame, host, buffer)
                .map_err(|e| e.or_location(frame.location(ip)))?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        op: Op,
        frame: &mut Frame<'_>,
        host: &mut dyn Host,
        buffer: &mut OutputBuffer,
    ) -> Result<(), VMError> {
        match op {
            Op::Halt => {}

            // Output
            Op::Text => {
                let index = frame.read_operand();
                buffer.push_trusted(frame.constant(index));
            }

            Op::EscapedTag => {
                let value = self.pop();
                buffer.push_escaped(&interpolate(value));
            }

            Op::UnescapedTag => {
                let value = self.pop();
                buffer.push_trusted(&interpolate(value));
            }

            // Lookup
            Op::Fetch => {
                let index = frame.read_operand();
                let value = self.context.fetch(frame.name(index));
                self.stack.push(value);
            }

            Op::FetchImplicit => {
                let value = self.context.top();
                self.stack.push(value);
            }

            Op::Find => {
                let index = frame.read_operand();
                let container = self.pop();
                self.stack.push(Context::find(&container, frame.name(index)));
            }

            // Blocks
            Op::Section => {
                let index = frame.read_operand();
                let value = self.pop();
                let info = frame.section(index);
                let body = frame.child(info.body);
                self.eval_section(info, body, value, host, buffer)?;
            }

            Op::InvertedSection => {
                let index = frame.read_operand();
                let value = self.pop();
                if value.is_falsy_or_empty() {
                    tracing::trace!(value = value.type_name(), "inverted section taken");
                    self.execute(frame.child(index), host, buffer)?;
                }
            }

            Op::Partial => {
                let name_index = frame.read_operand();
                let indentation_index = frame.read_operand();
                let name = frame.constant(name_index);
                let indentation = frame.constant(indentation_index);
                self.eval_partial(name, indentation, host, buffer)?;
            }
        }
        Ok(())
    }

    fn eval_section(
        &mut self,
        info: &SectionInfo,
        body: &Code,
        value: Value,
        host: &mut dyn Host,
        buffer: &mut OutputBuffer,
    ) -> Result<(), VMError> {
        let section = SectionValue::classify(value);
        tracing::trace!(?section, "section dispatch");
        match section {
            SectionValue::Skip => Ok(()),
            SectionValue::Once => self.execute(body, host, buffer),
            SectionValue::Push(value) => self.execute_in(value, body, host, buffer),
            SectionValue::Iterate(items) => {
                for item in items.iter() {
                    self.execute_in(item.clone(), body, host, buffer)?;
                }
                Ok(())
            }
            SectionValue::Lambda(lambda) => {
                let output = lambda.call_section(&info.raw).to_string();
                self.expand_lambda(&output, &info.open, &info.close, host, buffer)
            }
        }
    }

    /// Render lambda output as a template in the current context.
    fn expand_lambda(
        &mut self,
        output: &str,
        open: &str,
        close: &str,
        host: &mut dyn Host,
        buffer: &mut OutputBuffer,
    ) -> Result<(), VMError> {
        if !output.contains(open) {
            buffer.push_trusted(output);
            return Ok(());
        }
        tracing::debug!(len = output.len(), open, close, "expanding lambda section");
        self.nested(|vm| {
            let code = host.compile(output, open, close)?;
            vm.execute(&code, host, buffer)
        })
    }

    fn eval_partial(
        &mut self,
        name: &str,
        indentation: &str,
        host: &mut dyn Host,
        buffer: &mut OutputBuffer,
    ) -> Result<(), VMError> {
        self.nested(|vm| {
            let Some(code) = host.partial(name)? else {
                tracing::debug!(partial = name, "partial not found, rendering nothing");
                return Ok(());
            };
            if indentation.is_empty() {
                return vm.execute(&code, host, buffer);
            }
            let mut inner = OutputBuffer::new(buffer.escape_mode());
            vm.execute(&code, host, &mut inner)?;
            buffer.push_trusted(&indent(inner.as_str(), indentation));
            Ok(())
        })
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn execute_in(
        &mut self,
        frame: Value,
        code: &Code,
        host: &mut dyn Host,
        buffer: &mut OutputBuffer,
    ) -> Result<(), VMError> {
        self.context.push(frame);
        let result = self.execute(code, host, buffer);
        self.context.pop();
        result
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<(), VMError>) -> Result<(), VMError> {
        if self.depth >= self.config.max_depth {
            return Err(VMError::new(format!(
                "render depth exceeded (max {})",
                self.config.max_depth
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Null)
    }
}

/// String form of a tag value; callables are invoked first.
fn interpolate(value: Value) -> String {
    match value {
        Value::Lambda(lambda) => lambda.call().to_string(),
        value => value.to_string(),
    }
}

/// Prefix `indentation` at the start of `text` and after every newline
/// that is followed by more text.
fn indent(text: &str, indentation: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(text.len() + indentation.len());
    out.push_str(indentation);
    let mut rest = text;
    while let Some(i) = rest.find('\n') {
        out.push_str(&rest[..=i]);
        rest = &rest[i + 1..];
        if !rest.is_empty() {
            out.push_str(indentation);
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use whisker_compiler::{compile, compile_with_delimiters, CompilerConfig};
    use whisker_scanner::Delimiters;

    use crate::value::Object;

    #[derive(Default)]
    struct TestHost {
        partials: HashMap<String, String>,
        ambient: Option<Value>,
    }

    impl Host for TestHost {
        fn partial(&mut self, name: &str) -> Result<Option<Rc<Code>>, VMError> {
            let Some(source) = self.partials.get(name) else {
                return Ok(None);
            };
            compile(source, CompilerConfig { name: name.to_string() })
                .map(Some)
                .map_err(|e| VMError::new(e.to_string()))
        }

        fn compile(&mut self, source: &str, open: &str, close: &str) -> Result<Rc<Code>, VMError> {
            compile_with_delimiters(source, Delimiters::new(open, close), CompilerConfig::default())
                .map_err(|e| VMError::new(e.to_string()))
        }

        fn ambient(&self) -> Option<Value> {
            self.ambient.clone()
        }
    }

    fn render_with(source: &str, data: Value, host: &mut TestHost) -> Result<String, VMError> {
        let code = compile(source, CompilerConfig::default()).expect("compilation failed");
        VM::new(VMConfig::default()).render(&code, data, host)
    }

    fn render_ok(source: &str, data: Value) -> String {
        render_with(source, data, &mut TestHost::default()).expect("render failed")
    }

    #[test]
    fn test_vm_new() {
        let vm = VM::new(VMConfig::default());
        assert_eq!(vm.config().max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(vm.context().depth(), 0);
    }

    #[test]
    fn test_static_text() {
        assert_eq!(render_ok("no tags here\n", Value::Null), "no tags here\n");
    }

    #[test]
    fn test_escaped_and_unescaped() {
        let data = Value::map([("html", "<b>&</b>")]);
        assert_eq!(
            render_ok("{{html}} {{{html}}} {{&html}}", data),
            "&lt;b&gt;&amp;&lt;/b&gt; <b>&</b> <b>&</b>"
        );
    }

    #[test]
    fn test_escape_disabled() {
        let code = compile("{{html}}", CompilerConfig::default()).unwrap();
        let mut vm = VM::new(VMConfig {
            escape: EscapeMode::None,
            ..VMConfig::default()
        });
        let out = vm
            .render(&code, Value::map([("html", "<i>")]), &mut TestHost::default())
            .unwrap();
        assert_eq!(out, "<i>");
    }

    #[test]
    fn test_missing_values_render_empty() {
        assert_eq!(render_ok("[{{nope}}][{{a.b.c}}]", Value::map([("a", 1)])), "[][]");
    }

    #[test]
    fn test_dotted_path() {
        let data = Value::map([("user", Value::map([("name", "Ada")]))]);
        assert_eq!(render_ok("{{user.name}}", data), "Ada");
    }

    #[test]
    fn test_list_section() {
        let data = Value::map([("items", Value::list(["a", "b"]))]);
        assert_eq!(render_ok("{{#items}}{{.}} {{/items}}", data), "a b ");
    }

    #[test]
    fn test_section_values() {
        let data = Value::map([
            ("yes", Value::Bool(true)),
            ("no", Value::Bool(false)),
            ("empty", Value::list(Vec::<Value>::new())),
            ("zero", Value::Int(0)),
            ("user", Value::map([("name", "Ada")])),
        ]);
        assert_eq!(render_ok("{{#yes}}Y{{/yes}}", data.clone()), "Y");
        assert_eq!(render_ok("{{#no}}N{{/no}}", data.clone()), "");
        assert_eq!(render_ok("{{#empty}}E{{/empty}}", data.clone()), "");
        assert_eq!(render_ok("{{#missing}}M{{/missing}}", data.clone()), "");
        assert_eq!(render_ok("{{#zero}}[{{.}}]{{/zero}}", data.clone()), "[0]");
        assert_eq!(render_ok("{{#user}}{{name}}{{/user}}", data), "Ada");
    }

    #[test]
    fn test_outer_frames_stay_visible() {
        let data = Value::map([
            ("greeting", Value::from("hi")),
            ("people", Value::list([Value::map([("name", "a")]), Value::map([("name", "b")])])),
        ]);
        assert_eq!(
            render_ok("{{#people}}{{greeting}} {{name}};{{/people}}", data),
            "hi a;hi b;"
        );
    }

    #[test]
    fn test_inverted_section() {
        let data = Value::map([
            ("items", Value::list(Vec::<Value>::new())),
            ("yes", Value::Bool(true)),
        ]);
        assert_eq!(render_ok("{{^items}}none{{/items}}", data.clone()), "none");
        assert_eq!(render_ok("{{^missing}}none{{/missing}}", data.clone()), "none");
        assert_eq!(render_ok("{{^yes}}none{{/yes}}", data), "");
    }

    #[test]
    fn test_lambda_tag() {
        let data = Value::map([("now", Value::lambda(|| Value::from("<noon>")))]);
        assert_eq!(render_ok("{{now}}|{{{now}}}", data), "&lt;noon&gt;|<noon>");
    }

    #[test]
    fn test_lambda_section_receives_raw_text() {
        let seen = Rc::new(RefCell::new(String::new()));
        let captured = seen.clone();
        let data = Value::map([
            ("name", Value::from("Ada")),
            (
                "bold",
                Value::section_lambda(move |raw| {
                    *captured.borrow_mut() = raw.to_string();
                    Value::from(format!("<b>{}</b>", raw))
                }),
            ),
        ]);
        let out = render_ok("{{#bold}}Hi {{name}}{{/bold}}", data);
        assert_eq!(out, "<b>Hi Ada</b>");
        assert_eq!(seen.borrow().as_str(), "Hi {{name}}");
    }

    #[test]
    fn test_lambda_section_uses_section_delimiters() {
        let data = Value::map([
            ("name", Value::from("Ada")),
            ("wrap", Value::section_lambda(|raw| Value::from(format!("[{}]", raw)))),
        ]);
        let out = render_ok("{{=<% %>=}}<%#wrap%><%name%><%/wrap%>", data);
        assert_eq!(out, "[Ada]");
    }

    #[test]
    fn test_partial_with_indentation() {
        let mut host = TestHost::default();
        host.partials.insert("row".to_string(), "a\nb\n".to_string());
        let out = render_with("list:\n  {{>row}}\nend", Value::Null, &mut host).unwrap();
        assert_eq!(out, "list:\n  a\n  b\nend");
    }

    #[test]
    fn test_partial_sees_context() {
        let mut host = TestHost::default();
        host.partials.insert("user".to_string(), "<{{name}}>".to_string());
        let data = Value::map([("people", Value::list([Value::map([("name", "a")])]))]);
        let out = render_with("{{#people}}{{>user}}{{/people}}", data, &mut host).unwrap();
        assert_eq!(out, "<a>");
    }

    #[test]
    fn test_missing_partial_renders_nothing() {
        assert_eq!(render_ok("[{{>nothing}}]", Value::Null), "[]");
    }

    #[test]
    fn test_recursive_partial_depth_limit() {
        let mut host = TestHost::default();
        host.partials.insert("loop".to_string(), "x{{>loop}}".to_string());
        let err = render_with("{{>loop}}", Value::Null, &mut host).unwrap_err();
        assert!(err.message.contains("render depth exceeded"));
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_ambient_frame() {
        let mut host = TestHost {
            ambient: Some(Value::map([("site", "whisker"), ("name", "ambient")])),
            ..TestHost::default()
        };
        let out = render_with("{{site}}/{{name}}", Value::map([("name", "data")]), &mut host).unwrap();
        assert_eq!(out, "whisker/data");
    }

    #[derive(Debug)]
    struct Account {
        owner: &'static str,
    }

    impl Object for Account {
        fn get(&self, name: &str) -> Option<Value> {
            match name {
                "owner" => Some(Value::from(self.owner)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_object_lookup() {
        let data = Value::map([("account", Value::Object(Rc::new(Account { owner: "Ada" })))]);
        assert_eq!(
            render_ok("{{account.owner}} {{#account}}{{owner}}{{/account}}", data),
            "Ada Ada"
        );
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
        assert_eq!(indent("a\n", "  "), "  a\n");
        assert_eq!(indent("", "  "), "");
    }
}
