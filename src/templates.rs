//! Response templates
//!
//! Templates are plain HTML files read once at startup. Routes hold shared
//! handles, so a page referenced by several routes is loaded a single time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to load template `{name}` from {path}: {source}")]
pub struct TemplateError {
    pub name: String,
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Template {
    name: String,
    body: String,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self) -> &str {
        &self.body
    }
}

pub struct TemplateStore {
    dir: PathBuf,
    loaded: HashMap<String, Arc<Template>>,
}

impl TemplateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            loaded: HashMap::new(),
        }
    }

    /// Resolve a template reference, reading the file on first use
    pub fn load(&mut self, name: &str) -> Result<Arc<Template>, TemplateError> {
        if let Some(template) = self.loaded.get(name) {
            return Ok(Arc::clone(template));
        }

        let path = self.dir.join(name);
        let body = std::fs::read_to_string(&path).map_err(|source| TemplateError {
            name: name.to_string(),
            path: path.display().to_string(),
            source,
        })?;

        let template = Arc::new(Template::new(name, body));
        self.loaded.insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }
}
