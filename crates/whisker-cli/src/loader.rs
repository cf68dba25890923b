//! Filesystem partial loader.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use whisker::compiler::{compile, compile_with_delimiters};
use whisker::{Code, CompilerConfig, Delimiters, Host, VMError, Value};

/// Resolves `{{>name}}` to `<root>/<name>.<extension>`.
pub struct FsPartials {
    root: PathBuf,
    extension: String,
    cache: HashMap<String, Rc<Code>>,
    ambient: Option<Value>,
}

impl FsPartials {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            cache: HashMap::new(),
            ambient: None,
        }
    }

    /// Set a frame visible beneath every render's data.
    pub fn set_ambient(&mut self, ambient: Value) {
        self.ambient = Some(ambient);
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, VMError> {
        let valid = !name.is_empty()
            && Path::new(name)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(VMError::new(format!("invalid partial name {:?}", name)));
        }
        let file = if self.extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.extension)
        };
        Ok(self.root.join(file))
    }
}

impl Host for FsPartials {
    fn partial(&mut self, name: &str) -> Result<Option<Rc<Code>>, VMError> {
        if let Some(code) = self.cache.get(name) {
            return Ok(Some(code.clone()));
        }

        let path = self.path_for(name)?;
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no partial file");
                return Ok(None);
            }
            Err(e) => {
                return Err(VMError::new(format!(
                    "failed to read partial {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config = CompilerConfig {
            name: name.to_string(),
        };
        let code = compile(&source, config)
            .map_err(|e| VMError::new(format!("in partial {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded partial");
        self.cache.insert(name.to_string(), code.clone());
        Ok(Some(code))
    }

    fn compile(&mut self, source: &str, open: &str, close: &str) -> Result<Rc<Code>, VMError> {
        compile_with_delimiters(source, Delimiters::new(open, close), CompilerConfig::default())
            .map_err(|e| VMError::new(format!("in lambda output: {}", e)))
    }

    fn ambient(&self) -> Option<Value> {
        self.ambient.clone()
    }
}
