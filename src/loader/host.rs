//! The boundary to the host build system running nested compilations.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use camino::Utf8PathBuf;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::engine::RunState;
use crate::loader::{ChildOrigin, Loader, LoaderContext, Sources, read_stylesheet};

/// Name of the asset a nested compilation has to emit its module under.
pub const CHILD_FILENAME: &str = "child-css-filename";

/// A request for a nested, single-entry compilation of one stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRequest {
    pub resource: Utf8PathBuf,
    /// Loader request of the entry, without extraction.
    pub request: String,
    /// Asset the compiled module is expected under.
    pub filename: &'static str,
    /// Output name of the page, component or app the chain started from.
    pub origin_output_name: String,
    /// Output filename of the compiled resource, relative references inside
    /// it are computed against this.
    pub parent_output_name: String,
}

impl ChildRequest {
    pub(crate) fn origin(&self) -> ChildOrigin {
        ChildOrigin {
            origin_output_name: self.origin_output_name.clone(),
            parent_output_name: self.parent_output_name.clone(),
        }
    }
}

/// Executed value of a compiled stylesheet module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleValue {
    Text(String),
    /// `(module id, css)` pairs, one per module in the result.
    Rules(Vec<(String, String)>),
}

impl ModuleValue {
    pub fn into_text(self) -> String {
        match self {
            ModuleValue::Text(text) => text,
            ModuleValue::Rules(rules) => rules
                .into_iter()
                .map(|(_, css)| css)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// An asset emitted by a nested compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub source: String,
    /// What executing `source` evaluates to, when the host knows it.
    pub exports: Option<ModuleValue>,
}

#[derive(Debug, Clone, Default)]
pub struct ChildCompilation {
    pub assets: BTreeMap<String, EmittedAsset>,
    pub file_dependencies: Vec<Utf8PathBuf>,
    pub context_dependencies: Vec<Utf8PathBuf>,
}

/// Host service compiling a stylesheet in isolation from the parent graph.
pub trait ChildCompiler: Send + Sync + 'static {
    fn run_as_child(
        self: Arc<Self>,
        state: Arc<RunState>,
        request: ChildRequest,
    ) -> BoxFuture<'static, anyhow::Result<ChildCompilation>>;

    /// Execute an emitted module and return its exported value.
    fn exec(&self, asset: &EmittedAsset, request: &ChildRequest) -> anyhow::Result<ModuleValue> {
        asset
            .exports
            .clone()
            .ok_or_else(|| anyhow!("Couldn't execute '{}', no exports available.", request.request))
    }
}

/// Compiles nested stylesheets in process with the same loader.
pub struct InProcessCompiler {
    loader: Loader,
    sources: Arc<dyn Sources>,
}

impl InProcessCompiler {
    pub fn new(loader: Loader, sources: Arc<dyn Sources>) -> Self {
        Self { loader, sources }
    }
}

impl ChildCompiler for InProcessCompiler {
    fn run_as_child(
        self: Arc<Self>,
        state: Arc<RunState>,
        request: ChildRequest,
    ) -> BoxFuture<'static, anyhow::Result<ChildCompilation>> {
        async move {
            let resource = request.resource.clone();
            let (source, partials) = read_stylesheet(self.sources.as_ref(), &resource)?;

            let context = LoaderContext {
                resource_path: resource.clone(),
                state,
                compiler: self.clone(),
                child: Some(request.origin()),
                map: None,
            };
            let output = self.loader.process(context, &source).await?;

            let exports = output
                .exports
                .into_iter()
                .map(|rule| (rule.id, rule.css))
                .collect();

            let mut assets = BTreeMap::new();
            assets.insert(
                request.filename.to_string(),
                EmittedAsset {
                    source: output.source,
                    exports: Some(ModuleValue::Rules(exports)),
                },
            );

            let mut file_dependencies = vec![resource];
            file_dependencies.extend(partials);
            file_dependencies.extend(output.file_dependencies);

            Ok(ChildCompilation {
                assets,
                file_dependencies,
                context_dependencies: output.context_dependencies,
            })
        }
        .boxed()
    }
}
