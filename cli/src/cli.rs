//! Command-line arguments.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI entry point for the dotfile materializer.
#[derive(Parser, Debug)]
#[command(
    name = "dotrender",
    about = "Render a source tree of prefix-encoded dotfiles into a home directory",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Override the repository root (holds `conf/` and `home/`)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Directory targets are written to (defaults to $HOME)
    #[arg(long, global = true)]
    pub destination: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Fetch externals one at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the plan and write it to the destination
    Apply(PlanOpts),
    /// Show what apply would change, without writing
    Diff(PlanOpts),
    /// Render templates from arguments, a file or stdin
    ExecuteTemplate(ExecuteTemplateOpts),
    /// Print the template namespace as JSON
    Data,
    /// List target paths the plan manages
    Managed,
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Apply(_) => "apply",
            Self::Diff(_) => "diff",
            Self::ExecuteTemplate(_) => "execute-template",
            Self::Data => "data",
            Self::Managed => "managed",
            Self::Version => "version",
        }
    }
}

/// Options for commands that build a plan.
#[derive(Parser, Debug, Clone)]
pub struct PlanOpts {
    /// Re-fetch every external regardless of its refresh period
    #[arg(long)]
    pub refresh_externals: bool,
}

/// Options for the `execute-template` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ExecuteTemplateOpts {
    /// Read the template from a file
    #[arg(long, conflicts_with = "templates")]
    pub file: Option<PathBuf>,

    /// Template strings; each is rendered on its own line
    pub templates: Vec<String>,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::unreachable
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_with_globals() {
        let cli = Cli::parse_from([
            "dotrender",
            "--root",
            "/repo",
            "--destination",
            "/tmp/home",
            "-d",
            "apply",
            "--refresh-externals",
        ]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/repo")));
        assert_eq!(cli.global.destination, Some(PathBuf::from("/tmp/home")));
        assert!(cli.global.dry_run);
        assert!(matches!(
            cli.command,
            Command::Apply(PlanOpts {
                refresh_externals: true
            })
        ));
    }

    #[test]
    fn parallel_is_default() {
        let cli = Cli::parse_from(["dotrender", "diff"]);
        assert!(cli.global.parallel);
        let cli = Cli::parse_from(["dotrender", "--no-parallel", "diff"]);
        assert!(!cli.global.parallel);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dotrender", "managed", "-v", "--dry-run"]);
        assert!(cli.verbose);
        assert!(cli.global.dry_run);
        assert_eq!(cli.command.name(), "managed");
    }

    #[test]
    fn execute_template_arguments() {
        let cli = Cli::parse_from(["dotrender", "execute-template", "{{ .os }}", "{{ .home }}"]);
        let Command::ExecuteTemplate(opts) = cli.command else {
            unreachable!("parsed execute-template");
        };
        assert_eq!(opts.templates.len(), 2);
        assert!(opts.file.is_none());
    }

    #[test]
    fn execute_template_file_conflicts_with_arguments() {
        let result =
            Cli::try_parse_from(["dotrender", "execute-template", "--file", "t.tmpl", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_data_and_version() {
        assert!(matches!(
            Cli::parse_from(["dotrender", "data"]).command,
            Command::Data
        ));
        assert!(matches!(
            Cli::parse_from(["dotrender", "version"]).command,
            Command::Version
        ));
    }
}
