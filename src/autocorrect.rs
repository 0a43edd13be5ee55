//! Text rewrites applied after haml-lint's own auto-correct pass.
//!
//! These are line-oriented and never build a parse tree. Attribute hashes are
//! located by brace depth alone, so a `{` or `}` inside a string literal in an
//! attribute value can move the detected closing brace. That is a known
//! limitation of working without a parser.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Element line carrying an attribute hash: indentation, a `%tag`, `.class`
/// or `#id` chain, any `(html="attrs")` or `[object_ref]` groups, then `{`.
static HASH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*[%.#][A-Za-z_][\w\-:]*(?:[.#][\w\-]+)*(?:\([^)]*\)|\[[^\]]*\])*\{").unwrap()
});

static TRAILING_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+(\r?\n|$)").unwrap());

static OPTION_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_]+):\s*(\S*)").unwrap());

/// Spacing inside single-line attribute hashes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashSpacing {
    /// `%div{ foo: 1 }`
    #[default]
    Space,
    /// `%div{foo: 1}`
    NoSpace,
}

impl HashSpacing {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().trim_matches(|c| c == '"' || c == '\'') {
            "space" => Some(Self::Space),
            "no_space" => Some(Self::NoSpace),
            _ => None,
        }
    }
}

/// Rewrite settings read from the project's `.haml-lint.yml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocorrectConfig {
    pub final_newline: bool,
    pub hash_spacing: HashSpacing,
}

impl Default for AutocorrectConfig {
    fn default() -> Self {
        Self {
            final_newline: true,
            hash_spacing: HashSpacing::Space,
        }
    }
}

impl AutocorrectConfig {
    /// Read the config file, falling back to defaults when it is missing or unreadable.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_config_text(&text),
            Err(e) => {
                log::debug!("Using default autocorrect settings, could not read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Pull `FinalNewline.present` and `SpaceInsideHashAttributes.style` out of config text.
    pub fn from_config_text(text: &str) -> Self {
        let mut config = Self::default();

        if let Some(present) = linter_option(text, "FinalNewline", "present") {
            match present.as_str() {
                "true" => config.final_newline = true,
                "false" => config.final_newline = false,
                _ => {}
            }
        }

        if let Some(style) = linter_option(text, "SpaceInsideHashAttributes", "style")
            .as_deref()
            .and_then(HashSpacing::parse)
        {
            config.hash_spacing = style;
        }

        config
    }
}

/// Find `option` inside the `linter:` block, scoped by indentation.
fn linter_option(text: &str, linter: &str, option: &str) -> Option<String> {
    let mut lines = text.lines();
    let header = format!("{linter}:");

    let linter_indent = loop {
        let line = lines.next()?;
        if line.trim() == header {
            break indent_of(line);
        }
    };

    for line in lines {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        if indent_of(line) <= linter_indent {
            break;
        }
        if let Some(caps) = OPTION_LINE.captures(line)
            && &caps[1] == option
        {
            return Some(caps[2].to_string());
        }
    }
    None
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Run all rewrites in order: trailing whitespace, hash spacing, final newline.
pub fn apply(text: &str, config: &AutocorrectConfig) -> String {
    let text = strip_trailing_whitespace(text);
    let text = fix_hash_attributes(&text, config.hash_spacing);
    normalize_final_newline(&text, config.final_newline)
}

/// Drop spaces and tabs in front of every line terminator and at end of text.
pub fn strip_trailing_whitespace(text: &str) -> String {
    TRAILING_WHITESPACE.replace_all(text, "$1").into_owned()
}

/// Strip all trailing newlines, then add exactly one back if `present`.
///
/// The added terminator follows the text's first line ending, so CRLF
/// documents stay CRLF.
pub fn normalize_final_newline(text: &str, present: bool) -> String {
    let trimmed = text.trim_end_matches(['\n', '\r']);
    if !present {
        return trimmed.to_string();
    }
    let terminator = match text.find('\n') {
        Some(i) if text[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    };
    format!("{trimmed}{terminator}")
}

/// Apply [`fix_hash_attributes_on_line`] to each line, keeping terminators.
pub fn fix_hash_attributes(text: &str, spacing: HashSpacing) -> String {
    let mut out = String::with_capacity(text.len());
    for raw in text.split_inclusive('\n') {
        let body_len = raw.trim_end_matches(['\n', '\r']).len();
        let (body, terminator) = raw.split_at(body_len);
        out.push_str(&fix_hash_attributes_on_line(body, spacing));
        out.push_str(terminator);
    }
    out
}

/// Normalize spacing inside the attribute hash of one element line.
///
/// A hash closed on the same line is trimmed and rewrapped. A hash that runs
/// onto later lines only has its opening normalized; the remaining lines of
/// that hash are left as written.
pub fn fix_hash_attributes_on_line(line: &str, spacing: HashSpacing) -> String {
    let Some(found) = HASH_LINE.find(line) else {
        return line.to_string();
    };
    let open = found.end() - 1;
    let head = &line[..=open];
    let after_open = &line[open + 1..];

    match matching_close(after_open) {
        Some(close) => {
            let inner = after_open[..close].trim();
            let tail = &after_open[close + 1..];
            let wrapped = match spacing {
                _ if inner.is_empty() => String::new(),
                HashSpacing::Space => format!(" {inner} "),
                HashSpacing::NoSpace => inner.to_string(),
            };
            format!("{head}{wrapped}}}{tail}")
        }
        None => {
            let rest = after_open.trim_start();
            if rest.is_empty() {
                return line.to_string();
            }
            match spacing {
                HashSpacing::Space => format!("{head} {rest}"),
                HashSpacing::NoSpace => format!("{head}{rest}"),
            }
        }
    }
}

/// Byte offset of the `}` balancing an already-consumed `{`.
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
