//! Text-level patching of rule configuration files to disable a rule.
//!
//! Two dialects are supported and kept apart on purpose:
//!
//! - haml-lint (`.haml-lint.yml`): rules live under a top-level `linters:`
//!   section and are switched off with a lowercase `enabled: false`.
//! - RuboCop (`.rubocop.yml`): each cop is its own top-level key such as
//!   `Style/StringLiterals:` and is switched off with `Enabled: false`.
//!
//! Files are edited as text so comments and layout survive. Patching is
//! idempotent: a rule that is already disabled leaves the file untouched.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{HAML_LINT_CONFIG, RUBOCOP_CONFIG};

/// `Cop/Name: message` prefix of RuboCop offenses reported through haml-lint.
static COP_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Z][A-Za-z0-9]*/[A-Za-z0-9]+):").unwrap());

/// Name haml-lint reports for offenses coming from embedded RuboCop.
pub const RUBOCOP_LINTER: &str = "RuboCop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigDialect {
    HamlLint,
    Rubocop,
}

impl ConfigDialect {
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::HamlLint => HAML_LINT_CONFIG,
            Self::Rubocop => RUBOCOP_CONFIG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Disabled,
    AlreadyDisabled,
}

#[derive(Debug, Error)]
pub enum ConfigPatchError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Pick the rule and dialect a quick fix for a haml-lint diagnostic should target.
///
/// RuboCop offenses name the cop in the message prefix.
pub fn rule_target(linter_name: &str, message: &str) -> Option<(String, ConfigDialect)> {
    if linter_name == RUBOCOP_LINTER {
        return COP_PREFIX
            .captures(message)
            .map(|caps| (caps[1].to_string(), ConfigDialect::Rubocop));
    }
    (!linter_name.is_empty()).then(|| (linter_name.to_string(), ConfigDialect::HamlLint))
}

/// Disable `rule` in the file at `path`, creating the file if missing.
pub async fn disable_rule(path: &Path, rule: &str, dialect: ConfigDialect) -> Result<PatchOutcome, ConfigPatchError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(ConfigPatchError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let Some(patched) = disable_rule_in_text(&text, rule, dialect) else {
        log::debug!("{rule} is already disabled in {}", path.display());
        return Ok(PatchOutcome::AlreadyDisabled);
    };

    tokio::fs::write(path, patched)
        .await
        .map_err(|source| ConfigPatchError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    log::info!("Disabled {rule} in {}", path.display());
    Ok(PatchOutcome::Disabled)
}

/// Return the patched text, or `None` if `rule` is already disabled.
pub fn disable_rule_in_text(text: &str, rule: &str, dialect: ConfigDialect) -> Option<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    match dialect {
        ConfigDialect::HamlLint => disable_haml_lint(&mut lines, rule)?,
        ConfigDialect::Rubocop => disable_rubocop(&mut lines, rule)?,
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Some(out)
}

fn disable_haml_lint(lines: &mut Vec<String>, rule: &str) -> Option<()> {
    // An empty flow map is turned into a block section we can insert under.
    if let Some(empty) = lines.iter_mut().find(|l| without_comment(l) == "linters: {}") {
        *empty = "linters:".to_string();
    }

    let Some(section) = lines.iter().position(|l| without_comment(l) == "linters:") else {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push("linters:".to_string());
        lines.push(format!("  {rule}:"));
        lines.push("    enabled: false".to_string());
        return Some(());
    };

    let section_end = block_end(lines, section, 0);
    let child_indent = lines[section + 1..section_end]
        .iter()
        .find(|l| is_content(l))
        .map(|l| indent_of(l))
        .unwrap_or(2);

    let header = format!("{rule}:");
    let existing = (section + 1..section_end)
        .find(|&i| indent_of(&lines[i]) == child_indent && without_comment(&lines[i]).trim_start() == header);

    match existing {
        Some(rule_line) => set_enabled_false(lines, rule_line, child_indent, "enabled"),
        None => {
            lines.insert(section + 1, format!("{}{header}", " ".repeat(child_indent)));
            lines.insert(section + 2, format!("{}enabled: false", " ".repeat(child_indent + 2)));
            Some(())
        }
    }
}

fn disable_rubocop(lines: &mut Vec<String>, rule: &str) -> Option<()> {
    let header = format!("{rule}:");
    let quoted = [format!("'{rule}':"), format!("\"{rule}\":")];
    let existing = lines.iter().position(|l| {
        let l = without_comment(l);
        l == header || quoted.iter().any(|q| l == q)
    });

    match existing {
        Some(rule_line) => set_enabled_false(lines, rule_line, 0, "Enabled"),
        None => {
            if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(header);
            lines.push("  Enabled: false".to_string());
            Some(())
        }
    }
}

/// Inside the block headed by `header_line`, force `key: false`.
fn set_enabled_false(lines: &mut Vec<String>, header_line: usize, header_indent: usize, key: &str) -> Option<()> {
    let end = block_end(lines, header_line, header_indent);
    let prefix = format!("{key}:");

    for i in header_line + 1..end {
        let trimmed = lines[i].trim();
        if let Some(value) = trimmed.strip_prefix(&prefix) {
            let value = value.split('#').next().unwrap_or_default().trim();
            if value == "false" {
                return None;
            }
            lines[i] = format!("{}{prefix} false", " ".repeat(indent_of(&lines[i])));
            return Some(());
        }
    }

    let child_indent = lines[header_line + 1..end]
        .iter()
        .find(|l| is_content(l))
        .map(|l| indent_of(l))
        .unwrap_or(header_indent + 2);
    lines.insert(header_line + 1, format!("{}{prefix} false", " ".repeat(child_indent)));
    Some(())
}

/// Index one past the last line belonging to the block opened at `start`.
fn block_end(lines: &[String], start: usize, indent: usize) -> usize {
    let mut end = start + 1;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if !is_content(line) {
            continue;
        }
        if indent_of(line) <= indent {
            break;
        }
        end = i + 1;
    }
    end
}

/// `line` without a trailing `# comment` or whitespace.
fn without_comment(line: &str) -> &str {
    let cut = line
        .char_indices()
        .find(|&(i, c)| c == '#' && (i == 0 || line[..i].ends_with([' ', '\t'])))
        .map_or(line.len(), |(i, _)| i);
    line[..cut].trim_end()
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_haml_lint_creates_section() {
        let out = disable_rule_in_text("", "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(out, "linters:\n  LineLength:\n    enabled: false\n");
    }

    #[test]
    fn test_haml_lint_appends_after_other_keys() {
        let out = disable_rule_in_text("exclude:\n  - vendor/**\n", "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(
            out,
            "exclude:\n  - vendor/**\n\nlinters:\n  LineLength:\n    enabled: false\n"
        );
    }

    #[test]
    fn test_haml_lint_inserts_under_existing_section() {
        let text = "linters:\n    SpaceBeforeScript:\n      enabled: true\nskip_frontmatter: true\n";
        let out = disable_rule_in_text(text, "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(
            out,
            "linters:\n    LineLength:\n      enabled: false\n    SpaceBeforeScript:\n      enabled: true\nskip_frontmatter: true\n"
        );
    }

    #[test]
    fn test_haml_lint_flips_enabled_true() {
        let text = "linters:\n  LineLength:\n    enabled: true\n    max: 100\n";
        let out = disable_rule_in_text(text, "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(out, "linters:\n  LineLength:\n    enabled: false\n    max: 100\n");
    }

    #[test]
    fn test_haml_lint_adds_enabled_to_existing_block() {
        let text = "linters:\n  LineLength:\n    max: 100\n";
        let out = disable_rule_in_text(text, "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(out, "linters:\n  LineLength:\n    enabled: false\n    max: 100\n");
    }

    #[test]
    fn test_haml_lint_is_idempotent() {
        let once = disable_rule_in_text("", "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(disable_rule_in_text(&once, "LineLength", ConfigDialect::HamlLint), None);
        assert_eq!(once.matches("LineLength").count(), 1);
    }

    #[test]
    fn test_haml_lint_expands_empty_flow_map() {
        let out = disable_rule_in_text("linters: {}\n", "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(out, "linters:\n  LineLength:\n    enabled: false\n");
    }

    #[test]
    fn test_headers_with_trailing_comments() {
        let text = "linters:  # tuned for the app\n  LineLength:  # long views\n    max: 120\n";
        let out = disable_rule_in_text(text, "LineLength", ConfigDialect::HamlLint).unwrap();
        assert_eq!(
            out,
            "linters:  # tuned for the app\n  LineLength:  # long views\n    enabled: false\n    max: 120\n"
        );
        assert_eq!(out.matches("linters:").count(), 1);

        let out = disable_rule_in_text(text, "IdNames", ConfigDialect::HamlLint).unwrap();
        assert_eq!(
            out,
            "linters:  # tuned for the app\n  IdNames:\n    enabled: false\n  LineLength:  # long views\n    max: 120\n"
        );

        let text = "Style/StringLiterals: # house style\n  Enabled: false\n";
        assert_eq!(disable_rule_in_text(text, "Style/StringLiterals", ConfigDialect::Rubocop), None);
    }

    #[test]
    fn test_rubocop_appends_cop() {
        let text = "inherit_from: .rubocop_todo.yml\n";
        let out = disable_rule_in_text(text, "Style/StringLiterals", ConfigDialect::Rubocop).unwrap();
        assert_eq!(
            out,
            "inherit_from: .rubocop_todo.yml\n\nStyle/StringLiterals:\n  Enabled: false\n"
        );
    }

    #[test]
    fn test_rubocop_flips_existing_cop() {
        let text = "Style/StringLiterals:\n  EnforcedStyle: double_quotes\n  Enabled: true\nLayout/LineLength:\n  Max: 120\n";
        let out = disable_rule_in_text(text, "Style/StringLiterals", ConfigDialect::Rubocop).unwrap();
        assert_eq!(
            out,
            "Style/StringLiterals:\n  EnforcedStyle: double_quotes\n  Enabled: false\nLayout/LineLength:\n  Max: 120\n"
        );
    }

    #[test]
    fn test_rubocop_is_idempotent() {
        let once = disable_rule_in_text("", "Layout/LineLength", ConfigDialect::Rubocop).unwrap();
        assert_eq!(once, "Layout/LineLength:\n  Enabled: false\n");
        assert_eq!(disable_rule_in_text(&once, "Layout/LineLength", ConfigDialect::Rubocop), None);
    }

    #[test]
    fn test_dialects_do_not_cross_match() {
        // A lowercase `enabled: false` does not count for RuboCop.
        let text = "Layout/LineLength:\n  enabled: false\n";
        let out = disable_rule_in_text(text, "Layout/LineLength", ConfigDialect::Rubocop).unwrap();
        assert_eq!(out, "Layout/LineLength:\n  Enabled: false\n  enabled: false\n");
    }

    #[test]
    fn test_rule_target() {
        assert_eq!(
            rule_target("LineLength", "Line is too long."),
            Some(("LineLength".to_string(), ConfigDialect::HamlLint))
        );
        assert_eq!(
            rule_target("RuboCop", "Style/StringLiterals: Prefer single-quoted strings"),
            Some(("Style/StringLiterals".to_string(), ConfigDialect::Rubocop))
        );
        assert_eq!(rule_target("RuboCop", "something odd"), None);
        assert_eq!(rule_target("", "x"), None);
    }

    #[tokio::test]
    async fn test_disable_rule_twice_writes_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HAML_LINT_CONFIG);

        let first = disable_rule(&path, "LineLength", ConfigDialect::HamlLint).await.unwrap();
        let second = disable_rule(&path, "LineLength", ConfigDialect::HamlLint).await.unwrap();

        assert_eq!(first, PatchOutcome::Disabled);
        assert_eq!(second, PatchOutcome::AlreadyDisabled);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("LineLength:").count(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_target_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join(HAML_LINT_CONFIG);

        let err = disable_rule(&path, "LineLength", ConfigDialect::HamlLint).await.unwrap_err();
        assert!(matches!(err, ConfigPatchError::Write { .. }));
        assert!(err.to_string().contains("missing-dir"));
    }
}
