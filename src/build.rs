use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use futures::future::join_all;
use tracing::info;

use crate::config::{LoaderOptions, ProjectConfig};
use crate::engine::{CompileStatus, RunState};
use crate::error::{EmitError, LoaderError, Warning};
use crate::loader::{
    ChildCompiler, FsSources, InProcessCompiler, Loader, LoaderContext, LoaderOutput, Sources,
    read_stylesheet,
};
use crate::output::save_assets_to_dist;

/// One top-level build.
///
/// Owns the state shared by every stylesheet processed in the run. Nested
/// compilations started by one stylesheet are reused by all others.
pub struct Compilation {
    state: Arc<RunState>,
    loader: Loader,
    sources: Arc<dyn Sources>,
    compiler: Arc<dyn ChildCompiler>,
}

impl Compilation {
    /// A run reading stylesheets from disk and compiling imports in process.
    pub fn new(project: ProjectConfig, options: LoaderOptions) -> Self {
        Self::with_sources(project, options, Arc::new(FsSources))
    }

    pub fn with_sources(
        project: ProjectConfig,
        options: LoaderOptions,
        sources: Arc<dyn Sources>,
    ) -> Self {
        let loader = Loader::new(options);
        let compiler = Arc::new(InProcessCompiler::new(loader.clone(), sources.clone()));
        Self::with_compiler(project, loader, sources, compiler)
    }

    /// A run delegating nested compilations to a host provided compiler.
    pub fn with_compiler(
        project: ProjectConfig,
        loader: Loader,
        sources: Arc<dyn Sources>,
        compiler: Arc<dyn ChildCompiler>,
    ) -> Self {
        Self {
            state: Arc::new(RunState::new(project)),
            loader,
            sources,
            compiler,
        }
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    pub fn set_processing_sub_packages(&self, value: bool) {
        self.state.set_processing_sub_packages(value);
    }

    pub fn status(&self, output_filename: &str) -> Option<CompileStatus> {
        self.state.registry().status(output_filename)
    }

    /// Process a stylesheet of the main graph.
    pub async fn process(&self, path: impl AsRef<Utf8Path>) -> Result<LoaderOutput, LoaderError> {
        let path = path.as_ref();
        let (source, partials) = read_stylesheet(self.sources.as_ref(), path)?;
        let context = LoaderContext::new(path, self.state.clone(), self.compiler.clone());

        let mut output = self.loader.process(context, &source).await?;
        for partial in partials {
            if !output.file_dependencies.contains(&partial) {
                output.file_dependencies.push(partial);
            }
        }

        Ok(output)
    }

    /// Process several stylesheets concurrently. A failure only affects the
    /// stylesheet it belongs to.
    pub async fn process_all<I, P>(
        &self,
        paths: I,
    ) -> Vec<(Utf8PathBuf, Result<LoaderOutput, LoaderError>)>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        let paths: Vec<Utf8PathBuf> = paths.into_iter().map(|p| p.as_ref().to_owned()).collect();
        let results = join_all(paths.iter().map(|path| self.process(path))).await;

        paths.into_iter().zip(results).collect()
    }

    /// Drive `future` to completion on a single-threaded runtime. Nested
    /// compilations interleave on it, they never run in parallel.
    pub fn run_blocking<F: Future>(&self, future: F) -> std::io::Result<F::Output> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(runtime.block_on(future))
    }

    /// End the run and hand over everything it produced.
    pub fn finish(self) -> BuildOutput {
        let (assets, warnings) = self.state.take();
        BuildOutput { assets, warnings }
    }
}

/// Additional assets and diagnostics of a finished run.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Output filename -> compiled text, the first element is the stylesheet.
    pub assets: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<Warning>,
}

impl BuildOutput {
    /// Write every additional asset below `dist`.
    pub fn emit(&self, dist: impl AsRef<Utf8Path>) -> Result<(), EmitError> {
        let dist = dist.as_ref();
        let s = Instant::now();

        let assets = self
            .assets
            .iter()
            .filter_map(|(name, texts)| texts.first().map(|text| (name, text)));

        save_assets_to_dist(assets, dist).map_err(|e| EmitError(dist.to_owned(), e))?;

        info!(
            count = self.assets.len(),
            "wrote stylesheets to {dist} in {:.2?}",
            s.elapsed()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::ImportMode;
    use crate::engine::plan;
    use crate::loader::MemorySources;

    fn project() -> ProjectConfig {
        ProjectConfig::from_json(
            r#"{
                "projectRoot": "/p/src",
                "appEntry": "/p/src/app.mpx",
                "pages": { "/p/src/pages/index": "pages/index/index" }
            }"#,
        )
        .unwrap()
    }

    fn keep() -> LoaderOptions {
        LoaderOptions {
            import_mode: ImportMode::Keep,
            ..LoaderOptions::default()
        }
    }

    fn output_for(compilation: &Compilation, request: &str) -> String {
        plan(compilation.state(), "app.mpx", Utf8Path::new(request)).output_filename
    }

    #[test]
    fn test_nested_chain() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"styles/a.css\";\n.app{}")
            .with("/p/src/styles/a.css", "@import \"b.css\";\n.a{}")
            .with("/p/src/styles/b.css", ".b { background: url(./bg.png) }");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let output = compilation
            .run_blocking(compilation.process("/p/src/app.wxss"))
            .unwrap()
            .unwrap();

        let a = output_for(&compilation, "/p/src/styles/a.css");
        let b = output_for(&compilation, "/p/src/styles/b.css");
        let b_name = &b["wxss/".len()..];

        assert_eq!(output.exports[0].css, format!("@import \"{a}\";\n.app{{}}"));
        assert_eq!(compilation.status(&a), Some(CompileStatus::Done));
        assert_eq!(compilation.status(&b), Some(CompileStatus::Done));

        // The nested stylesheet references its import relative to its own output.
        let assets = compilation.finish().assets;
        assert_eq!(assets[&a], [format!("@import \"{b_name}\";\n.a{{}}")]);
        assert_eq!(assets[&b], [".b { background: url(./bg.png) }"]);
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn test_dependencies_propagate() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"a.css\";")
            .with("/p/src/a.css", "@import \"b.css\";")
            .with("/p/src/b.css", ".b{}");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let output = compilation
            .run_blocking(compilation.process("/p/src/app.wxss"))
            .unwrap()
            .unwrap();

        assert_eq!(
            output.file_dependencies,
            [Utf8Path::new("/p/src/a.css"), Utf8Path::new("/p/src/b.css")]
        );
    }

    #[test]
    fn test_import_cycle_terminates() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"a.css\";")
            .with("/p/src/a.css", "@import \"b.css\";\n.a{}")
            .with("/p/src/b.css", "@import \"a.css\";\n.b{}");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let output = compilation.run_blocking(compilation.process("/p/src/app.wxss")).unwrap();

        assert!(output.is_ok());
        let a = output_for(&compilation, "/p/src/a.css");
        let b = output_for(&compilation, "/p/src/b.css");
        let assets = compilation.finish().assets;

        assert!(assets[&a][0].ends_with(".a{}"));
        assert!(assets[&b][0].ends_with(".b{}"));
    }

    /// Drive `future` on its own thread so a stuck build fails the test
    /// instead of hanging it.
    fn finishes<T: Send + 'static>(future: impl FnOnce() -> T + Send + 'static) -> T {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(future());
        });
        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("build did not finish")
    }

    #[test]
    fn test_sibling_import_cycle_terminates() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"a.css\";\n@import \"b.css\";")
            .with("/p/src/a.css", "@import \"b.css\";\n.a{}")
            .with("/p/src/b.css", "@import \"a.css\";\n.b{}");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let (compilation, css) = finishes(move || {
            let output = compilation.run_blocking(compilation.process("/p/src/app.wxss"));
            let css = output
                .unwrap()
                .map(|output| output.exports[0].css.clone())
                .map_err(|e| e.to_string());
            (compilation, css)
        });

        let a = output_for(&compilation, "/p/src/a.css");
        let b = output_for(&compilation, "/p/src/b.css");

        assert_eq!(css.unwrap(), format!("@import \"{a}\";\n@import \"{b}\";"));
        assert_eq!(compilation.status(&a), Some(CompileStatus::Done));
        assert_eq!(compilation.status(&b), Some(CompileStatus::Done));

        let assets = compilation.finish().assets;
        assert!(assets[&a][0].ends_with(".a{}"));
        assert!(assets[&b][0].ends_with(".b{}"));
    }

    #[test]
    fn test_cycle_across_stylesheets_terminates() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"a.css\";")
            .with("/p/src/pages/index.wxss", "@import \"../b.css\";")
            .with("/p/src/a.css", "@import \"b.css\";\n.a{}")
            .with("/p/src/b.css", "@import \"a.css\";\n.b{}");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let (compilation, results) = finishes(move || {
            let results = compilation.run_blocking(
                compilation.process_all(["/p/src/app.wxss", "/p/src/pages/index.wxss"]),
            );
            let ok: Vec<bool> = results.unwrap().iter().map(|(_, r)| r.is_ok()).collect();
            (compilation, ok)
        });

        assert_eq!(results, [true, true]);

        let a = output_for(&compilation, "/p/src/a.css");
        let b = output_for(&compilation, "/p/src/b.css");
        assert_eq!(compilation.status(&a), Some(CompileStatus::Done));
        assert_eq!(compilation.status(&b), Some(CompileStatus::Done));
        assert_eq!(compilation.state().registry().len(), 2);
    }

    #[test]
    fn test_warnings_reach_the_run_when_an_import_fails() {
        let sources = MemorySources::new().with(
            "/p/src/app.wxss",
            "@import url(x.css) { color: red }\n@import \"missing.css\";",
        );

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let output = compilation
            .run_blocking(compilation.process("/p/src/app.wxss"))
            .unwrap();

        assert!(matches!(output, Err(LoaderError::NestedCompilation { .. })));
        assert!(matches!(
            compilation.state().warnings()[..],
            [Warning::MalformedImport { .. }]
        ));
    }

    #[test]
    fn test_process_all_isolates_failures() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"common.css\";")
            .with(
                "/p/src/pages/index.wxss",
                "@import \"../common.css\";\n@import \"missing.css\";",
            )
            .with("/p/src/common.css", ".c{}");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let results = compilation
            .run_blocking(
                compilation.process_all(["/p/src/app.wxss", "/p/src/pages/index.wxss"]),
            )
            .unwrap();

        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(LoaderError::NestedCompilation { .. })
        ));

        let common = output_for(&compilation, "/p/src/common.css");
        let missing = output_for(&compilation, "/p/src/pages/missing.css");
        assert_eq!(compilation.status(&common), Some(CompileStatus::Done));
        assert_eq!(compilation.status(&missing), Some(CompileStatus::Failed));
        assert_eq!(compilation.state().registry().len(), 2);
    }

    #[test]
    fn test_warnings_and_emit() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import url(x.css) { color: red }\n@import \"a.css\";")
            .with("/p/src/a.css", ".a{}");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        compilation
            .run_blocking(compilation.process("/p/src/app.wxss"))
            .unwrap()
            .unwrap();

        let a = output_for(&compilation, "/p/src/a.css");
        let output = compilation.finish();
        assert_eq!(output.warnings.len(), 1);

        let dir = tempfile::tempdir().unwrap();
        let dist = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        output.emit(&dist).unwrap();

        assert_eq!(fs::read_to_string(dist.join(&a)).unwrap(), ".a{}");
    }

    #[cfg(feature = "grass")]
    #[test]
    fn test_scss_import() {
        let sources = MemorySources::new()
            .with("/p/src/app.wxss", "@import \"theme.scss\";")
            .with("/p/src/theme.scss", "$c: red;\n.t { color: $c; }");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        compilation
            .run_blocking(compilation.process("/p/src/app.wxss"))
            .unwrap()
            .unwrap();

        let theme = output_for(&compilation, "/p/src/theme.scss");
        let assets = compilation.finish().assets;
        assert!(assets[&theme][0].contains("color: red"));
    }

    #[cfg(feature = "grass")]
    #[test]
    fn test_scss_partials_are_dependencies() {
        let sources = MemorySources::new()
            .with("/p/src/app.scss", "@use \"vars\";\n.app { color: vars.$c; }")
            .with("/p/src/_vars.scss", "$c: red;");

        let compilation = Compilation::with_sources(project(), keep(), Arc::new(sources));
        let output = compilation
            .run_blocking(compilation.process("/p/src/app.scss"))
            .unwrap()
            .unwrap();

        assert!(output.exports[0].css.contains("color: red"));
        assert!(output.file_dependencies.contains(&Utf8PathBuf::from("/p/src/_vars.scss")));
    }
}
