use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::ProjectConfig;
use crate::engine::CompilationRegistry;
use crate::error::Warning;

/// State shared by every stylesheet processed during one run.
///
/// Nothing here survives the run, a new build starts from a fresh state.
#[derive(Debug)]
pub struct RunState {
    project: ProjectConfig,
    project_root: Utf8PathBuf,
    processing_sub_packages: AtomicBool,
    /// Resources already emitted for the main package.
    main_claims: Mutex<HashSet<Utf8PathBuf>>,
    pub(crate) registry: CompilationRegistry,
    /// Output filename -> compiled text, the first element is the stylesheet.
    assets: Mutex<BTreeMap<String, Vec<String>>>,
    diagnostics: Mutex<Vec<Warning>>,
}

impl RunState {
    pub fn new(project: ProjectConfig) -> Self {
        let project_root = project.project_root();

        Self {
            project,
            project_root,
            processing_sub_packages: AtomicBool::new(false),
            main_claims: Mutex::default(),
            registry: CompilationRegistry::default(),
            assets: Mutex::default(),
            diagnostics: Mutex::default(),
        }
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn processing_sub_packages(&self) -> bool {
        self.processing_sub_packages.load(Ordering::Acquire)
    }

    pub fn set_processing_sub_packages(&self, value: bool) {
        self.processing_sub_packages.store(value, Ordering::Release);
    }

    /// Mark a resource as owned by the main package. Returns `true` for the
    /// first claim.
    pub(crate) fn claim_main(&self, path: &Utf8Path) -> bool {
        self.main_claims.lock().unwrap().insert(path.to_owned())
    }

    pub fn is_main_claimed(&self, path: &Utf8Path) -> bool {
        self.main_claims.lock().unwrap().contains(path)
    }

    pub fn registry(&self) -> &CompilationRegistry {
        &self.registry
    }

    pub(crate) fn record_asset(&self, output_filename: &str, text: String) {
        self.assets
            .lock()
            .unwrap()
            .insert(output_filename.to_string(), vec![text]);
    }

    /// A copy of the additional assets produced so far.
    pub fn assets(&self) -> BTreeMap<String, Vec<String>> {
        self.assets.lock().unwrap().clone()
    }

    pub(crate) fn push_warnings(&self, warnings: &[Warning]) {
        self.diagnostics
            .lock()
            .unwrap()
            .extend_from_slice(warnings);
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.diagnostics.lock().unwrap().clone()
    }

    pub(crate) fn take(&self) -> (BTreeMap<String, Vec<String>>, Vec<Warning>) {
        let assets = std::mem::take(&mut *self.assets.lock().unwrap());
        let warnings = std::mem::take(&mut *self.diagnostics.lock().unwrap());
        (assets, warnings)
    }
}
