//! Run-scoped bookkeeping of nested compilations.
//!
//! A [`RunState`] is created once per build and shared by every stylesheet
//! processed in it. It decides where the compiled form of an imported
//! stylesheet goes ([`plan`]) and guarantees that each output path is
//! compiled by exactly one nested build.

mod planner;
mod registry;
mod scheduler;
mod state;

pub use planner::{ResourcePlan, origin_output_name, plan};
pub use registry::{CompilationRegistry, CompileStatus, Compiled};
pub use state::RunState;

pub(crate) use registry::CompileFuture;
pub(crate) use scheduler::ensure_compiled;
