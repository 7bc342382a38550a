//! Template rendering of aggregation documents and catalogs.
//!
//! The built-in templates are compiled into the binary. A template directory
//! may add templates or replace built-ins by file name. Autoescaping is off:
//! templates escape with `| escape_xml` where XML needs it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera, Value, from_value};

use crate::error::{Error, Result};

pub const AGGREGATION_TEMPLATE: &str = "esgf.ncml.xml";
pub const CATALOG_TEMPLATE: &str = "catalog.xml";

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    (AGGREGATION_TEMPLATE, include_str!("../templates/esgf.ncml.xml")),
    ("catalog_macros.xml", include_str!("../templates/catalog_macros.xml")),
    (CATALOG_TEMPLATE, include_str!("../templates/catalog.xml")),
];

pub type HelperFn = fn(&HashMap<String, Value>) -> tera::Result<Value>;

/// Named functions callable from templates.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, HelperFn>,
}

impl FunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path helpers for user templates: `basename`, `dirname` and `relpath`.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        _ = registry
            .register("basename", basename)
            .register("dirname", dirname)
            .register("relpath", relpath);
        registry
    }

    pub fn register(&mut self, name: &str, function: HelperFn) -> &mut Self {
        _ = self.functions.insert(name.to_string(), function);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

fn string_arg(args: &HashMap<String, Value>, name: &str, function: &str) -> tera::Result<String> {
    args.get(name)
        .map(|v| from_value::<String>(v.clone()))
        .ok_or_else(|| tera::Error::msg(format!("{function} requires '{name}'")))?
        .map_err(tera::Error::from)
}

/// `basename(path=...)`
pub fn basename(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let path = PathBuf::from(string_arg(args, "path", "basename")?);
    Ok(Value::String(
        path.file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    ))
}

/// `dirname(path=...)`
pub fn dirname(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let path = PathBuf::from(string_arg(args, "path", "dirname")?);
    Ok(Value::String(
        path.parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    ))
}

/// `relpath(path=..., base=...)`: `path` below `base`, or `path` unchanged.
pub fn relpath(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let path = PathBuf::from(string_arg(args, "path", "relpath")?);
    let base = PathBuf::from(string_arg(args, "base", "relpath")?);
    Ok(Value::String(
        path.strip_prefix(&base)
            .unwrap_or(&path)
            .display()
            .to_string(),
    ))
}

/// Renders named templates against serializable data.
#[derive(Debug)]
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Built-in templates only.
    pub fn new(functions: &FunctionRegistry) -> Result<Self> {
        Self::build(functions, None)
    }

    /// Built-in templates, then every file of `dir` under its file name.
    pub fn with_template_dir(functions: &FunctionRegistry, dir: &Path) -> Result<Self> {
        Self::build(functions, Some(dir))
    }

    fn build(functions: &FunctionRegistry, dir: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        for (name, function) in &functions.functions {
            tera.register_function(name, *function);
        }
        tera.add_raw_templates(BUILTIN_TEMPLATES.to_vec())?;

        if let Some(dir) = dir {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    files.push((entry.path(), Some(name)));
                }
            }
            let dir_str = dir.display().to_string();
            diagnostics::log_debug!("Loading {count} templates from {dir}", count: files.len(), dir: dir_str);
            tera.add_template_files(files)?;
        }
        Ok(Self { tera })
    }

    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render template `name` with the fields of `data` as its context.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        if !self.has_template(name) {
            return Err(Error::Template(format!("template '{name}' not found")));
        }
        let context = Context::from_serialize(data)?;
        Ok(self.tera.render(name, &context)?)
    }
}
