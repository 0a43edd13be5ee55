//! LSP-facing helpers: quick-fix code actions and command arguments.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::*;

use crate::config_patch::{ConfigDialect, rule_target};
use crate::diagnostics::DIAGNOSTIC_SOURCE;

/// Command behind the "disable this rule" quick fix.
pub const DISABLE_RULE_COMMAND: &str = "hamlLint.disableRule";

/// Arguments of [`DISABLE_RULE_COMMAND`], sent as a positional array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableRuleArgs {
    pub uri: Url,
    pub rule: String,
    pub dialect: ConfigDialect,
}

impl DisableRuleArgs {
    pub fn to_arguments(&self) -> Vec<serde_json::Value> {
        vec![
            serde_json::Value::String(self.uri.to_string()),
            serde_json::Value::String(self.rule.clone()),
            serde_json::to_value(self.dialect).unwrap_or_default(),
        ]
    }

    pub fn from_arguments(arguments: Vec<serde_json::Value>) -> Option<Self> {
        let mut arguments = arguments.into_iter();
        let uri = Url::parse(arguments.next()?.as_str()?).ok()?;
        let rule = arguments.next()?.as_str()?.to_string();
        let dialect = serde_json::from_value(arguments.next()?).ok()?;
        Some(Self { uri, rule, dialect })
    }
}

/// Build the "disable rule" quick fix for one of our diagnostics.
pub fn disable_rule_action(diagnostic: &Diagnostic, uri: &Url) -> Option<CodeAction> {
    if diagnostic.source.as_deref() != Some(DIAGNOSTIC_SOURCE) {
        return None;
    }
    let linter = match &diagnostic.code {
        Some(NumberOrString::String(code)) => code.as_str(),
        _ => return None,
    };
    let (rule, dialect) = rule_target(linter, &diagnostic.message)?;

    let args = DisableRuleArgs {
        uri: uri.clone(),
        rule,
        dialect,
    };
    let title = format!("Disable {} in {}", args.rule, dialect.default_file_name());

    Some(CodeAction {
        title: title.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic.clone()]),
        command: Some(Command {
            title,
            command: DISABLE_RULE_COMMAND.to_string(),
            arguments: Some(args.to_arguments()),
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(code: &str, message: &str) -> Diagnostic {
        Diagnostic {
            code: Some(NumberOrString::String(code.to_string())),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_haml_lint_quick_fix() {
        let uri = Url::parse("file:///proj/a.haml").unwrap();
        let action = disable_rule_action(&diagnostic("LineLength", "too long"), &uri).unwrap();
        assert_eq!(action.title, "Disable LineLength in .haml-lint.yml");

        let command = action.command.unwrap();
        assert_eq!(command.command, DISABLE_RULE_COMMAND);
        let args = DisableRuleArgs::from_arguments(command.arguments.unwrap()).unwrap();
        assert_eq!(args.rule, "LineLength");
        assert_eq!(args.dialect, ConfigDialect::HamlLint);
        assert_eq!(args.uri, uri);
    }

    #[test]
    fn test_rubocop_quick_fix() {
        let uri = Url::parse("file:///proj/a.haml").unwrap();
        let action = disable_rule_action(
            &diagnostic("RuboCop", "Style/StringLiterals: Prefer single-quoted strings."),
            &uri,
        )
        .unwrap();
        assert_eq!(action.title, "Disable Style/StringLiterals in .rubocop.yml");
    }

    #[test]
    fn test_foreign_diagnostics_ignored() {
        let uri = Url::parse("file:///proj/a.haml").unwrap();
        let mut other = diagnostic("LineLength", "too long");
        other.source = Some("rubocop-lsp".to_string());
        assert!(disable_rule_action(&other, &uri).is_none());
    }

    #[test]
    fn test_bad_arguments_rejected() {
        assert!(DisableRuleArgs::from_arguments(vec![serde_json::json!(1)]).is_none());
        assert!(DisableRuleArgs::from_arguments(Vec::new()).is_none());
    }
}
