//! Options of the loader and the project-wide context shared by one run.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::Platform;
use crate::error::ConfigError;

/// How top-level `@import` rules are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Each unique import becomes a module reference in the runtime code and
    /// the rule is removed from the stylesheet.
    #[default]
    Inline,
    /// Each unique import keeps its rule, with the URL replaced by a
    /// placeholder that is later substituted with the compiled output path.
    #[serde(alias = "deferred")]
    Keep,
}

/// Target of an alias entry, either a bare path or the long form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AliasTarget {
    Path(String),
    #[serde(rename_all = "camelCase")]
    Full {
        alias: String,
        #[serde(default)]
        only_module: bool,
    },
}

/// Request paths of the runtime helpers required by generated modules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimePaths {
    pub css_base: String,
    pub escape: String,
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self {
            css_base: "wxss-loader/lib/css-base.js".into(),
            escape: "wxss-loader/lib/url/escape.js".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    /// Directory root-relative `url()` references are resolved against. When
    /// absent such references are left alone.
    pub root: Option<String>,
    /// Ordered alias table, the first matching entry wins.
    pub alias: IndexMap<String, AliasTarget>,
    pub source_map: bool,
    /// Turn `url()` references into module requests.
    pub url: bool,
    /// Process `@import` rules at all.
    pub import: bool,
    pub import_mode: ImportMode,
    /// Loader string prepended to inline import requests.
    pub import_prefix: String,
    pub minimize: bool,
    pub runtime: RuntimePaths,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            root: None,
            alias: IndexMap::new(),
            source_map: false,
            url: true,
            import: true,
            import_mode: ImportMode::default(),
            import_prefix: String::new(),
            minimize: false,
            runtime: RuntimePaths::default(),
        }
    }
}

impl LoaderOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        Self::from_json(&read(path.as_ref())?)
    }
}

/// Project layout known to the host build, shared by every stylesheet of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// Defaults to the directory of `app_entry`.
    pub project_root: Option<Utf8PathBuf>,
    /// Absolute path of the app entry module.
    pub app_entry: Utf8PathBuf,
    /// Base directory for module identifiers, defaults to the project root.
    pub context: Option<Utf8PathBuf>,
    pub platform: Platform,
    /// Source path without extension -> output name of a page.
    pub pages: IndexMap<Utf8PathBuf, String>,
    /// Source path without extension -> output name of a component.
    pub components: IndexMap<Utf8PathBuf, String>,
    /// Source directory -> sub-package root, in declaration order.
    pub sub_packages: IndexMap<Utf8PathBuf, String>,
    pub production: bool,
}

impl ProjectConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        Self::from_json(&read(path.as_ref())?)
    }

    pub fn project_root(&self) -> Utf8PathBuf {
        match &self.project_root {
            Some(root) => root.clone(),
            None => self
                .app_entry
                .parent()
                .map(Utf8Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    pub fn context(&self) -> Utf8PathBuf {
        self.context.clone().unwrap_or_else(|| self.project_root())
    }
}

fn read(path: &Utf8Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_owned(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_options_defaults() {
        let options = LoaderOptions::from_json("{}").unwrap();

        assert!(options.url);
        assert!(options.import);
        assert!(!options.source_map);
        assert_eq!(options.import_mode, ImportMode::Inline);
        assert_eq!(options, LoaderOptions::default());
    }

    #[test]
    fn test_loader_options_full() {
        let options = LoaderOptions::from_json(
            r#"{
                "root": "/static",
                "alias": { "@": "/src", "vendor$": { "alias": "/lib/v.css", "onlyModule": true } },
                "sourceMap": true,
                "importMode": "deferred",
                "importPrefix": "-!wxss-loader!"
            }"#,
        )
        .unwrap();

        assert_eq!(options.root.as_deref(), Some("/static"));
        assert_eq!(options.import_mode, ImportMode::Keep);
        assert_eq!(options.import_prefix, "-!wxss-loader!");

        let keys: Vec<_> = options.alias.keys().map(String::as_str).collect();
        assert_eq!(keys, ["@", "vendor$"]);
        assert_eq!(
            options.alias["vendor$"],
            AliasTarget::Full {
                alias: "/lib/v.css".into(),
                only_module: true
            }
        );
    }

    #[test]
    fn test_project_config_order_and_defaults() {
        let project = ProjectConfig::from_json(
            r#"{
                "appEntry": "/p/src/app.mpx",
                "platform": "swan",
                "subPackages": { "/p/src/packageB": "packageB", "/p/src/packageA": "packageA" }
            }"#,
        )
        .unwrap();

        assert_eq!(project.project_root(), Utf8Path::new("/p/src"));
        assert_eq!(project.context(), Utf8Path::new("/p/src"));
        assert_eq!(project.platform, Platform::Swan);

        let roots: Vec<_> = project.sub_packages.values().map(String::as_str).collect();
        assert_eq!(roots, ["packageB", "packageA"]);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("options.json")).unwrap();
        fs::write(&path, r#"{ "url": false }"#).unwrap();

        assert!(!LoaderOptions::from_file(&path).unwrap().url);
        assert!(matches!(
            LoaderOptions::from_file(path.with_file_name("missing.json")),
            Err(ConfigError::Io(..))
        ));
        assert!(matches!(
            ProjectConfig::from_json("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }
}
