use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::core::Hash32;
use crate::engine::RunState;
use crate::output::{normalize_path, relative_path, resolve_path, strip_extension, to_posix};

/// Directory compiled stylesheets are emitted to, below the package root.
const STYLES_DIR: &str = "wxss";

/// Where the compiled form of an imported stylesheet goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePlan {
    pub request_path: Utf8PathBuf,
    /// Output path in posix form, relative to the output root.
    pub output_filename: String,
    /// Root of the sub-package the output is placed in, empty for the main package.
    pub sub_package_root: String,
    /// Whether the main package emits this resource.
    pub main_owned: bool,
}

/// Output name of the page, component or app a stylesheet belongs to.
///
/// Inside a nested compilation the name remembered from the stylesheet that
/// started the chain wins.
pub fn origin_output_name(
    state: &RunState,
    resource: &Utf8Path,
    memorized: Option<&str>,
) -> String {
    if let Some(name) = memorized {
        return name.to_string();
    }

    let project = state.project();
    let key = strip_extension(resource);

    project
        .pages
        .get(&key)
        .or_else(|| project.components.get(&key))
        .cloned()
        .unwrap_or_else(|| relative_path(state.project_root(), &project.app_entry))
}

/// Decide the output path of `request_path` imported from the stylesheet
/// belonging to `origin_output_name`.
///
/// The file name only depends on the request path, never on the content. A
/// resource lands in a sub-package only while sub-packages are processed,
/// when the origin lives inside that sub-package and the main package has
/// not emitted the resource already. The first matching sub-package in
/// declaration order wins.
pub fn plan(state: &RunState, origin_output_name: &str, request_path: &Utf8Path) -> ResourcePlan {
    let request_path = normalize_path(&Utf8PathBuf::from(to_posix(request_path)));
    let mut sub_package_root = String::new();

    let main_owned = if state.processing_sub_packages() {
        let origin_output_path = resolve_path(state.project_root(), origin_output_name);
        let claimed = state.is_main_claimed(&request_path);

        if !claimed {
            let found = state.project().sub_packages.iter().find(|(src, _)| {
                origin_output_path.starts_with(resolve_path(state.project_root(), src))
            });

            if let Some((_, root)) = found {
                sub_package_root = root.clone();
            }
        }

        claimed
    } else {
        state.claim_main(&request_path);
        true
    };

    let name = request_path.file_stem().unwrap_or_default();
    let hash = Hash32::hash(request_path.as_str()).to_short();
    let ext = state.project().platform.styles_ext();

    let output = Utf8Path::new(&sub_package_root)
        .join(STYLES_DIR)
        .join(format!("{name}{hash}{ext}"));
    let output_filename = to_posix(normalize_path(&output));

    debug!(
        request = %request_path,
        output = %output_filename,
        sub_package = %sub_package_root,
        "planned stylesheet output"
    );

    ResourcePlan {
        request_path,
        output_filename,
        sub_package_root,
        main_owned,
    }
}
