use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tdspu::{
    ArrayReader, FileEnumerator, FunctionRegistry, ListEnumerator, Pipeline, Renderer, RunConfig,
    WalkDirEnumerator, default_reader,
};

use crate::error_utils::ErrorContext;
use crate::template_utils::expand_yaml_template;

/// Everything a command needs from the command line besides its own arguments.
pub struct RunContext {
    /// Configuration file; built-in CMIP5 defaults when absent
    pub config_path: Option<PathBuf>,
    /// `-v key=value` pairs for configuration templating
    pub vars: HashMap<String, String>,
    pub verbose: bool,
    reader: Arc<dyn ArrayReader>,
}

impl RunContext {
    #[must_use]
    pub fn new(config_path: Option<PathBuf>, vars: Vec<(String, String)>) -> Self {
        Self {
            config_path,
            vars: vars.into_iter().collect(),
            verbose: false,
            reader: default_reader(),
        }
    }

    /// Use `reader` instead of the build's default file reader.
    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn ArrayReader>) -> Self {
        self.reader = reader;
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Read, expand and validate the configuration.
    pub fn load_config(&self) -> Result<RunConfig> {
        let Some(path) = &self.config_path else {
            return Ok(RunConfig::default());
        };
        let path_str = path.display().to_string();
        let text = std::fs::read_to_string(path).file_context("read", &path_str)?;
        let expanded = expand_yaml_template(&text, &self.vars)?;
        let config = RunConfig::from_yaml(&expanded).config_context(&path_str)?;
        diagnostics::log_debug!("Loaded configuration from {path}", path: path_str);
        Ok(config)
    }

    /// A pipeline over `config`, with templates from `templates` if given.
    pub fn pipeline(&self, config: RunConfig, templates: Option<&Path>) -> Result<Pipeline> {
        let functions = FunctionRegistry::builtin();
        let renderer = match templates {
            Some(dir) => Renderer::with_template_dir(&functions, dir),
            None => Renderer::new(&functions),
        }
        .template_context("load")?;
        Ok(Pipeline::new(config, renderer, self.reader.clone()))
    }
}

/// Walk `root`, or read the file list from `files_from` (`-` for stdin).
pub fn enumerator(files_from: Option<&str>) -> Result<Box<dyn FileEnumerator>> {
    match files_from {
        None => Ok(Box::new(WalkDirEnumerator::new())),
        Some("-") => {
            let list = ListEnumerator::from_reader(std::io::stdin().lock())
                .with_context_msg("Failed to read file list from stdin")?;
            Ok(Box::new(list))
        }
        Some(path) => {
            let list = ListEnumerator::from_file(Path::new(path)).file_context("read file list", path)?;
            Ok(Box::new(list))
        }
    }
}
