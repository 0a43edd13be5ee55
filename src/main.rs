use clap::{Args, Parser, Subcommand};

use haml_lint_lsp::runner::CorrectionMode;

mod commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the commands that run haml-lint.
#[derive(Args, Debug, Clone)]
pub struct CheckerArgs {
    /// haml-lint command, may include a prefix such as `bundle exec`
    #[arg(long, default_value = "haml-lint")]
    pub executable: String,

    /// haml-lint configuration file (default: nearest .haml-lint.yml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Linters to exclude (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude_linter: Vec<String>,

    /// Extra arguments passed to haml-lint verbatim
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub extra_args: String,

    /// Timeout for one haml-lint run in milliseconds (0 = none)
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Language Server Protocol server
    Server {
        /// TCP port to listen on (for debugging)
        #[arg(long)]
        port: Option<u16>,

        /// haml-lint configuration file used for every document
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Lint a file and print the findings
    Check {
        /// File to lint
        file: String,

        #[command(flatten)]
        checker: CheckerArgs,
    },

    /// Format a file with haml-lint auto-correct and the built-in rewrites
    Fmt {
        /// File to format
        file: String,

        /// Report whether the file would change without writing it
        #[arg(long)]
        check: bool,

        /// Auto-correct mode
        #[arg(long, value_enum, default_value = "safe")]
        mode: ModeArg,

        /// Skip the built-in rewrites after haml-lint
        #[arg(long)]
        no_autocorrections: bool,

        #[command(flatten)]
        checker: CheckerArgs,
    },

    /// Disable a rule in the project's configuration file
    Disable {
        /// Linter name (e.g. LineLength) or RuboCop cop (e.g. Style/StringLiterals)
        rule: String,

        /// Patch .rubocop.yml instead of .haml-lint.yml
        #[arg(long)]
        rubocop: bool,

        /// Configuration file to patch
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Safe,
    All,
}

impl From<ModeArg> for CorrectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Safe => CorrectionMode::Safe,
            ModeArg::All => CorrectionMode::All,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // stdout carries LSP traffic, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Commands::Server { port, config } => commands::server::handle_server(port, config),
        Commands::Check { file, checker } => commands::check::handle_check(&file, &checker),
        Commands::Fmt {
            file,
            check,
            mode,
            no_autocorrections,
            checker,
        } => commands::fmt::handle_fmt(&file, check, mode.into(), !no_autocorrections, &checker),
        Commands::Disable { rule, rubocop, config } => {
            commands::disable::handle_disable(&rule, rubocop, config.as_deref())
        }
    }
}
