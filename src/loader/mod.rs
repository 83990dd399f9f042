//! The stylesheet loader.
//!
//! [`Loader::process`] turns the source of one stylesheet into the text of a
//! runtime module. Imported stylesheets are compiled by nested compilations
//! through a [`ChildCompiler`], at most once per output path in a run.

mod assemble;
mod host;
mod process;
#[cfg(feature = "grass")]
mod scss;
mod sources;

use std::sync::Arc;

use camino::Utf8PathBuf;
use serde_json::Value;

use crate::config::LoaderOptions;
use crate::engine::RunState;
use crate::resolve::AliasResolver;

pub use host::{
    CHILD_FILENAME, ChildCompilation, ChildCompiler, ChildRequest, EmittedAsset, InProcessCompiler,
    ModuleValue,
};
pub use sources::{FsSources, MemorySources, Sources};

pub(crate) use sources::read_stylesheet;

/// Stylesheet loader configured with one set of options.
#[derive(Debug, Clone)]
pub struct Loader {
    options: LoaderOptions,
    resolver: AliasResolver,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> Self {
        let resolver = AliasResolver::new(&options.alias);
        Self { options, resolver }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }
}

/// What a nested compilation remembers about the chain that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildOrigin {
    pub origin_output_name: String,
    /// Output filename of the stylesheet being compiled.
    pub parent_output_name: String,
}

/// Everything the loader needs to know about one invocation.
pub struct LoaderContext {
    pub resource_path: Utf8PathBuf,
    pub state: Arc<RunState>,
    pub compiler: Arc<dyn ChildCompiler>,
    /// Set when running inside a nested compilation.
    pub child: Option<ChildOrigin>,
    /// Source map produced by a previous loader.
    pub map: Option<Value>,
}

impl LoaderContext {
    pub fn new(
        resource_path: impl Into<Utf8PathBuf>,
        state: Arc<RunState>,
        compiler: Arc<dyn ChildCompiler>,
    ) -> Self {
        Self {
            resource_path: resource_path.into(),
            state,
            compiler,
            child: None,
            map: None,
        }
    }

    pub fn with_map(mut self, map: Value) -> Self {
        self.map = Some(map);
        self
    }
}

/// One entry of the exported module array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRule {
    pub id: String,
    /// Stylesheet text with every reference resolved.
    pub css: String,
    pub media: String,
}

#[derive(Debug, Clone)]
pub struct LoaderOutput {
    /// Text of the runtime module.
    pub source: String,
    pub exports: Vec<ModuleRule>,
    pub map: Option<Value>,
    pub warnings: Vec<crate::error::Warning>,
    pub file_dependencies: Vec<Utf8PathBuf>,
    pub context_dependencies: Vec<Utf8PathBuf>,
}
