//! Server settings and haml-lint config file resolution.
//!
//! Settings arrive from the editor as LSP initialization options or through
//! `workspace/didChangeConfiguration`. The config resolver decides which
//! `.haml-lint.yml` to hand to the checker and where to run it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::{CorrectionMode, RunOptions};

/// File name haml-lint looks for in a project.
pub const HAML_LINT_CONFIG: &str = ".haml-lint.yml";

/// File name RuboCop looks for in a project.
pub const RUBOCOP_CONFIG: &str = ".rubocop.yml";

/// Key under which editors nest our settings in `didChangeConfiguration`.
pub const SETTINGS_SECTION: &str = "hamlLint";

/// Editor-facing settings for the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Command used to run haml-lint, may include a prefix like `bundle exec`
    pub executable_path: String,
    /// Lint on open, change and save
    pub enable_diagnostics: bool,
    /// Answer `textDocument/formatting`
    pub enable_formatting: bool,
    /// Which auto-correct flavour haml-lint runs with
    pub formatter_mode: CorrectionMode,
    /// Format in the background after every save
    pub format_on_save: bool,
    /// Run the in-process rewrites after haml-lint's own pass
    pub enable_autocorrections: bool,
    /// Extra arguments for diagnostics runs
    pub lint_args: String,
    /// Extra arguments for formatting runs
    pub format_args: String,
    /// Explicit config file, relative paths resolve against the workspace root
    pub config_path: Option<String>,
    /// Linters never run, passed as `--exclude-linter`
    pub disabled_rules: Vec<String>,
    /// Bound on one checker run in milliseconds, 0 disables the bound
    pub timeout_ms: u64,
    /// Delay before linting after a text change
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable_path: "haml-lint".to_string(),
            enable_diagnostics: true,
            enable_formatting: true,
            formatter_mode: CorrectionMode::Safe,
            format_on_save: false,
            enable_autocorrections: true,
            lint_args: String::new(),
            format_args: String::new(),
            config_path: None,
            disabled_rules: Vec::new(),
            timeout_ms: 30_000,
            debounce_ms: 300,
        }
    }
}

impl Settings {
    /// Read settings from a `didChangeConfiguration` payload.
    ///
    /// Accepts both `{ "hamlLint": { ... } }` and the bare settings object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match value {
            serde_json::Value::Object(mut map) if map.contains_key(SETTINGS_SECTION) => {
                let section = map.remove(SETTINGS_SECTION).unwrap_or_default();
                serde_json::from_value(section)
            }
            other => serde_json::from_value(other),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Where one document's checker run happens and with which config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerContext {
    pub config_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl CheckerContext {
    /// Resolve the context for `document` inside an optional workspace root.
    pub fn resolve(settings: &Settings, document: Option<&Path>, workspace_root: Option<&Path>) -> Self {
        let document_dir = document.and_then(Path::parent);
        let working_dir = workspace_root.or(document_dir).map(Path::to_path_buf);

        let config_path = match settings.config_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(explicit) => {
                let explicit = Path::new(explicit);
                Some(match (explicit.is_relative(), &working_dir) {
                    (true, Some(base)) => base.join(explicit),
                    _ => explicit.to_path_buf(),
                })
            }
            None => document_dir.and_then(|dir| find_config_upwards(dir, workspace_root)),
        };

        Self {
            config_path,
            working_dir,
        }
    }

    /// Options for a diagnostics run.
    pub fn lint_options(&self, settings: &Settings) -> RunOptions {
        RunOptions {
            executable: settings.executable_path.clone(),
            auto_correct: None,
            working_dir: self.working_dir.clone(),
            config_path: self.config_path.clone(),
            excluded_linters: settings.disabled_rules.clone(),
            extra_args: settings.lint_args.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Options for an auto-correct run.
    pub fn format_options(&self, settings: &Settings) -> RunOptions {
        RunOptions {
            auto_correct: Some(settings.formatter_mode),
            extra_args: settings.format_args.clone(),
            ..self.lint_options(settings)
        }
    }

    /// Where a new config file for `file_name` would be created.
    pub fn project_file(&self, file_name: &str) -> Option<PathBuf> {
        self.working_dir.as_ref().map(|dir| dir.join(file_name))
    }
}

/// Walk up from `start` looking for `.haml-lint.yml`, stopping at `stop` if given.
pub fn find_config_upwards(start: &Path, stop: Option<&Path>) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(HAML_LINT_CONFIG);
        if candidate.is_file() {
            return Some(candidate);
        }
        if stop.is_some_and(|stop| dir == stop) {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let settings: Settings = serde_json::from_value(json!({ "formatOnSave": true })).unwrap();
        assert!(settings.format_on_save);
        assert_eq!(settings.executable_path, "haml-lint");
        assert_eq!(settings.timeout(), Some(Duration::from_millis(30_000)));
    }

    #[test]
    fn test_settings_from_nested_section() {
        let settings = Settings::from_value(json!({
            "hamlLint": { "formatterMode": "all", "disabledRules": ["LineLength"], "timeoutMs": 0 }
        }))
        .unwrap();
        assert_eq!(settings.formatter_mode, CorrectionMode::All);
        assert_eq!(settings.disabled_rules, vec!["LineLength".to_string()]);
        assert_eq!(settings.timeout(), None);
    }

    #[test]
    fn test_invalid_mode_is_an_error() {
        assert!(Settings::from_value(json!({ "formatterMode": "aggressive" })).is_err());
    }

    #[test]
    fn test_format_options_carry_mode_and_format_args() {
        let settings = Settings {
            lint_args: "--lint".to_string(),
            format_args: "--fmt".to_string(),
            ..Default::default()
        };
        let ctx = CheckerContext::default();
        let lint = ctx.lint_options(&settings);
        let format = ctx.format_options(&settings);
        assert_eq!(lint.auto_correct, None);
        assert_eq!(lint.extra_args, "--lint");
        assert_eq!(format.auto_correct, Some(CorrectionMode::Safe));
        assert_eq!(format.extra_args, "--fmt");
    }

    #[test]
    fn test_explicit_relative_config_resolves_against_root() {
        let settings = Settings {
            config_path: Some("config/haml.yml".to_string()),
            ..Default::default()
        };
        let ctx = CheckerContext::resolve(
            &settings,
            Some(Path::new("/proj/app/views/a.haml")),
            Some(Path::new("/proj")),
        );
        assert_eq!(ctx.config_path, Some(PathBuf::from("/proj/config/haml.yml")));
        assert_eq!(ctx.working_dir, Some(PathBuf::from("/proj")));
    }

    #[test]
    fn test_config_found_by_walking_up() {
        let root = tempfile::tempdir().unwrap();
        let views = root.path().join("app/views");
        std::fs::create_dir_all(&views).unwrap();
        std::fs::write(root.path().join(HAML_LINT_CONFIG), "linters: {}\n").unwrap();

        let ctx = CheckerContext::resolve(
            &Settings::default(),
            Some(&views.join("index.html.haml")),
            Some(root.path()),
        );
        assert_eq!(ctx.config_path, Some(root.path().join(HAML_LINT_CONFIG)));
    }

    #[test]
    fn test_walk_stops_at_workspace_root() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("proj");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(outer.path().join(HAML_LINT_CONFIG), "").unwrap();

        assert_eq!(find_config_upwards(&root, Some(&root)), None);
    }
}
