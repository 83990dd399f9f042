use camino::Utf8Path;
use futures::TryFutureExt;
use futures::future::try_join_all;
use indexmap::IndexSet;
use tracing::{Instrument, debug, info_span};

use crate::Platform;
use crate::core::Hash32;
use crate::css::Stylesheet;
use crate::engine::{ensure_compiled, origin_output_name, plan};
use crate::error::LoaderError;
use crate::loader::assemble::{Runtime, js_fragment, module_text, normalize_map};
use crate::loader::{
    CHILD_FILENAME, ChildRequest, Loader, LoaderContext, LoaderOutput, ModuleRule,
};
use crate::output::{fix_swan_relative, output_dir, relative_path, resolve_path};
use crate::plugin::{
    ImportOptions, ImportResult, Placeholder, extract_urls, parse_imports, url_placeholder,
};
use crate::resolve::{escape_url, is_url_request, split_request, stringify_request, url_to_request};

/// Identifier of a stylesheet module, stable across machines.
fn module_id(context: &Utf8Path, resource: &Utf8Path, content: &str, production: bool) -> String {
    let short = relative_path(context, resource);
    let short = short.trim_start_matches("../");

    match production {
        true => Hash32::hash(format!("{short}\n{content}")).to_short(),
        false => Hash32::hash(short).to_short(),
    }
}

impl Loader {
    /// Process the source of one stylesheet.
    ///
    /// Imports of other stylesheets are compiled by nested compilations and
    /// this only returns once all of them have finished. If any of them fails
    /// no module is produced.
    pub async fn process(
        &self,
        context: LoaderContext,
        content: &str,
    ) -> Result<LoaderOutput, LoaderError> {
        let span = info_span!("stylesheet", path = %context.resource_path);
        self.process_inner(context, content).instrument(span).await
    }

    async fn process_inner(
        &self,
        context: LoaderContext,
        content: &str,
    ) -> Result<LoaderOutput, LoaderError> {
        let LoaderContext {
            resource_path,
            state,
            compiler,
            child,
            map,
        } = context;

        let options = &self.options;
        let root = options.root.as_deref();
        let project = state.project();

        let production = options.minimize || project.production;
        let id = module_id(&project.context(), &resource_path, content, production);

        let map = match options.source_map {
            true => map.map(normalize_map),
            false => None,
        };

        let mut sheet = Stylesheet::parse(content)
            .map_err(|e| LoaderError::Stylesheet(resource_path.clone(), e))?;

        let imports = match options.import {
            true => parse_imports(
                &mut sheet,
                &resource_path,
                &ImportOptions {
                    mode: options.import_mode,
                    prefix: &options.import_prefix,
                    root,
                },
            ),
            false => ImportResult::default(),
        };
        state.push_warnings(&imports.warnings);

        let urls = match options.url {
            true => extract_urls(&mut sheet, root),
            false => Vec::new(),
        };

        let mut css = sheet.to_css();
        let mut css_js = stringify_request(&css);

        for (n, item) in urls.iter().enumerate() {
            let placeholder = url_placeholder(n);
            let url = self.resolver.resolve(&item.url);
            let (path, suffix) = split_request(&url);
            let request = url_to_request(path, root);

            let code = format!(
                "\" + escape(require({})) + \"{}",
                stringify_request(&request),
                js_fragment(suffix)
            );
            css_js = css_js.replace(&placeholder, &code);
            css = css.replace(&placeholder, &format!("{}{suffix}", escape_url(&request)));
        }

        let origin = origin_output_name(
            &state,
            &resource_path,
            child.as_ref().map(|c| c.origin_output_name.as_str()),
        );
        let parent_output_name = child
            .as_ref()
            .map(|c| c.parent_output_name.clone())
            .unwrap_or_else(|| origin.clone());
        let waiter = child.as_ref().map(|c| c.parent_output_name.as_str());
        let resource_dir = resource_path.parent().unwrap_or(Utf8Path::new(""));

        let mut pending = Vec::new();

        for Placeholder {
            placeholder,
            reference,
        } in &imports.placeholders
        {
            if !is_url_request(&reference.url, root) {
                css_js = css_js.replace(placeholder, &js_fragment(&reference.url));
                css = css.replace(placeholder, &reference.url);
                continue;
            }

            let url = self.resolver.resolve(&reference.url);
            let (path, suffix) = split_request(&url);
            let plan = plan(&state, &origin, &resolve_path(resource_dir, path));

            let mut relative =
                relative_path(output_dir(&parent_output_name), &plan.output_filename);
            if project.platform == Platform::Swan {
                relative = fix_swan_relative(relative);
            }
            let replacement = format!("{relative}{suffix}");

            css_js = css_js.replace(placeholder, &js_fragment(&replacement));
            css = css.replace(placeholder, &replacement);

            let request = ChildRequest {
                resource: plan.request_path.clone(),
                request: format!("!!wxss-loader?noExtract!{}", plan.request_path),
                filename: CHILD_FILENAME,
                origin_output_name: origin.clone(),
                parent_output_name: plan.output_filename.clone(),
            };
            let name = request.request.clone();

            if let Some(future) = ensure_compiled(&state, &compiler, &plan, waiter, request) {
                pending.push(future.map_err(move |source| LoaderError::NestedCompilation {
                    request: name,
                    source,
                }));
            }
        }

        debug!(pending = pending.len(), "waiting for nested compilations");
        let compiled = try_join_all(pending).await?;

        let mut file_dependencies = IndexSet::new();
        let mut context_dependencies = IndexSet::new();
        for result in &compiled {
            file_dependencies.extend(result.file_dependencies.iter().cloned());
            context_dependencies.extend(result.context_dependencies.iter().cloned());
        }

        let escape = (!urls.is_empty()).then_some(options.runtime.escape.as_str());
        let source = module_text(&Runtime {
            escape,
            css_base: &options.runtime.css_base,
            source_map: options.source_map,
            imports: &imports.code,
            css: &css_js,
            map: map.as_ref(),
        });

        Ok(LoaderOutput {
            source,
            exports: vec![ModuleRule {
                id,
                css,
                media: String::new(),
            }],
            map,
            warnings: imports.warnings,
            file_dependencies: file_dependencies.into_iter().collect(),
            context_dependencies: context_dependencies.into_iter().collect(),
        })
    }
}
