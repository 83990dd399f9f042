use std::sync::Arc;

use anyhow::anyhow;
use futures::FutureExt;
use futures::future::ready;
use tokio::runtime::Handle;
use tracing::debug;

use crate::engine::registry::Scheduled;
use crate::engine::{CompileFuture, Compiled, ResourcePlan, RunState};
use crate::error::CompileError;
use crate::loader::{ChildCompilation, ChildCompiler, ChildRequest};

/// Make sure the resource of `plan` is compiled exactly once in this run.
///
/// The first caller for an output path spawns the nested compilation, every
/// later caller gets the same shared handle. `waiter` is the output path of
/// the nested compilation asking, `None` for a top-level stylesheet. `None`
/// is returned when the requested output already waits on `waiter`, waiting
/// for it would never finish.
pub(crate) fn ensure_compiled(
    state: &Arc<RunState>,
    compiler: &Arc<dyn ChildCompiler>,
    plan: &ResourcePlan,
    waiter: Option<&str>,
    request: ChildRequest,
) -> Option<CompileFuture> {
    let output = plan.output_filename.as_str();

    let Scheduled { future, scheduled } = state.registry.get_or_schedule(output, waiter, || {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = CompileError::new(anyhow!(e).context("No Tokio runtime to compile on"));
                return ready(Err(err)).boxed().shared();
            }
        };

        let task = runtime.spawn(compile_child(
            state.clone(),
            compiler.clone(),
            output.to_string(),
            request.clone(),
        ));

        task.map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(CompileError::new(e)),
        })
        .boxed()
        .shared()
    });

    if scheduled {
        debug!(output, request = %request.request, "scheduled nested compilation");
    } else {
        debug!(output, "reusing nested compilation");
    }

    if future.is_none() {
        debug!(output, waiter, "output waits on the caller, not waiting for it");
    }

    future
}

async fn compile_child(
    state: Arc<RunState>,
    compiler: Arc<dyn ChildCompiler>,
    output: String,
    request: ChildRequest,
) -> Result<Compiled, CompileError> {
    let ChildCompilation {
        mut assets,
        file_dependencies,
        context_dependencies,
    } = compiler.clone().run_as_child(state.clone(), request.clone()).await?;

    let asset = assets.remove(request.filename);
    if !assets.is_empty() {
        debug!(output, discarded = assets.len(), "discarding chunk assets");
    }
    drop(assets);

    let asset = asset.ok_or_else(|| anyhow!("Didn't get a result from child compiler"))?;
    let text = compiler.exec(&asset, &request)?.into_text();

    state.record_asset(&output, text.clone());

    Ok(Compiled {
        text: text.into(),
        file_dependencies,
        context_dependencies,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use camino::Utf8Path;
    use futures::future::BoxFuture;

    use super::*;
    use crate::config::ProjectConfig;
    use crate::engine::{CompileStatus, plan};
    use crate::loader::{CHILD_FILENAME, EmittedAsset, ModuleValue};

    /// Emits a chunk asset, and the module only when `named` is set.
    struct Emitter {
        named: bool,
    }

    impl ChildCompiler for Emitter {
        fn run_as_child(
            self: Arc<Self>,
            _: Arc<RunState>,
            request: ChildRequest,
        ) -> BoxFuture<'static, anyhow::Result<ChildCompilation>> {
            async move {
                let mut assets = BTreeMap::new();
                assets.insert(
                    "0.js".to_string(),
                    EmittedAsset {
                        source: "chunk".into(),
                        exports: None,
                    },
                );
                if self.named {
                    assets.insert(
                        request.filename.to_string(),
                        EmittedAsset {
                            source: String::new(),
                            exports: Some(ModuleValue::Text(".a{}".into())),
                        },
                    );
                }

                Ok(ChildCompilation {
                    assets,
                    ..ChildCompilation::default()
                })
            }
            .boxed()
        }
    }

    fn request(output: &str) -> ChildRequest {
        ChildRequest {
            resource: "/p/a.css".into(),
            request: "!!wxss-loader?noExtract!/p/a.css".into(),
            filename: CHILD_FILENAME,
            origin_output_name: "app".into(),
            parent_output_name: output.into(),
        }
    }

    #[tokio::test]
    async fn test_only_designated_asset_is_kept() {
        let state = Arc::new(RunState::new(ProjectConfig::default()));
        let compiler: Arc<dyn ChildCompiler> = Arc::new(Emitter { named: true });
        let plan = plan(&state, "app", Utf8Path::new("/p/a.css"));

        let request = request(&plan.output_filename);
        let future = ensure_compiled(&state, &compiler, &plan, None, request);
        let compiled = future.unwrap().await.unwrap();

        assert_eq!(&*compiled.text, ".a{}");
        assert_eq!(state.assets().len(), 1);
        assert_eq!(state.assets()[&plan.output_filename], [".a{}"]);
    }

    #[tokio::test]
    async fn test_missing_output_fails() {
        let state = Arc::new(RunState::new(ProjectConfig::default()));
        let compiler: Arc<dyn ChildCompiler> = Arc::new(Emitter { named: false });
        let plan = plan(&state, "app", Utf8Path::new("/p/a.css"));

        let request = request(&plan.output_filename);
        let future = ensure_compiled(&state, &compiler, &plan, None, request);
        let err = future.unwrap().await.unwrap_err();

        assert_eq!(err.to_string(), "Didn't get a result from child compiler");
        assert_eq!(
            state.registry().status(&plan.output_filename),
            Some(CompileStatus::Failed)
        );
    }

    #[tokio::test]
    async fn test_own_output_is_not_awaited() {
        let state = Arc::new(RunState::new(ProjectConfig::default()));
        let compiler: Arc<dyn ChildCompiler> = Arc::new(Emitter { named: true });
        let plan = plan(&state, "app", Utf8Path::new("/p/a.css"));
        let output = plan.output_filename.clone();

        ensure_compiled(&state, &compiler, &plan, None, request(&output));
        let future = ensure_compiled(&state, &compiler, &plan, Some(&output), request(&output));

        assert!(future.is_none());
        assert_eq!(state.registry().len(), 1);
    }

    #[test]
    fn test_missing_runtime_fails() {
        let state = Arc::new(RunState::new(ProjectConfig::default()));
        let compiler: Arc<dyn ChildCompiler> = Arc::new(Emitter { named: true });
        let plan = plan(&state, "app", Utf8Path::new("/p/a.css"));

        let request = request(&plan.output_filename);
        let future = ensure_compiled(&state, &compiler, &plan, None, request).unwrap();
        let err = futures::executor::block_on(future).unwrap_err();

        assert!(err.to_string().contains("No Tokio runtime"));
        assert_eq!(
            state.registry().status(&plan.output_filename),
            Some(CompileStatus::Failed)
        );
    }
}
