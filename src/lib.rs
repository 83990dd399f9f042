#![forbid(unsafe_code)]
//! Stylesheet loader for mini-program builds.
//!
//! Every stylesheet is turned into a small runtime module exporting its CSS.
//! Stylesheets pulled in with `@import` are compiled separately, each one
//! exactly once per run, and emitted as additional assets under a `wxss/`
//! directory. Sub-packages get private copies of the stylesheets only they
//! use.
//!
//! ```rust,ignore
//! use wxss_loader::{Compilation, LoaderOptions, ProjectConfig};
//!
//! let project = ProjectConfig::from_file("project.json")?;
//! let options = LoaderOptions::from_file("loader.json")?;
//!
//! let compilation = Compilation::new(project, options);
//! let output = compilation.run_blocking(compilation.process("src/app.wxss"))??;
//! println!("{}", output.source);
//!
//! compilation.finish().emit("dist")?;
//! ```

mod build;
pub mod config;
mod core;
pub mod css;
pub mod engine;
mod error;
pub mod loader;
#[cfg(feature = "logging")]
pub mod logging;
pub mod output;
pub mod plugin;
pub mod resolve;

pub use crate::build::{BuildOutput, Compilation};
pub use crate::config::{ImportMode, LoaderOptions, ProjectConfig};
pub use crate::core::Platform;
pub use crate::engine::{CompileStatus, ResourcePlan, RunState};
pub use crate::error::*;
pub use crate::loader::{
    ChildCompiler, ChildRequest, InProcessCompiler, Loader, LoaderContext, LoaderOutput,
    ModuleValue,
};
