//! Process exit statuses for the `check`, `fmt` and `disable` commands.
//!
//! `0` clean, `1` when haml-lint reported findings (or `fmt --check` would
//! rewrite a file), `2` when haml-lint could not be run or a file could not
//! be read or written.

pub const SUCCESS: i32 = 0;
pub const VIOLATIONS_FOUND: i32 = 1;
pub const TOOL_ERROR: i32 = 2;

/// Outcome of a CLI run, mapped onto the codes above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Findings,
    Failed,
}

impl Outcome {
    pub fn code(self) -> i32 {
        match self {
            Outcome::Clean => SUCCESS,
            Outcome::Findings => VIOLATIONS_FOUND,
            Outcome::Failed => TOOL_ERROR,
        }
    }

    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}

/// Shorthands used by the command handlers.
pub mod exit {
    use super::Outcome;

    pub fn success() -> ! {
        Outcome::Clean.exit()
    }

    pub fn violations_found() -> ! {
        Outcome::Findings.exit()
    }

    pub fn tool_error() -> ! {
        Outcome::Failed.exit()
    }
}
