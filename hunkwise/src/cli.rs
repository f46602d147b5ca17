//! Command-line surface.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "hunkwise",
    version,
    about = "Read a change as a narrated, importance-tagged review",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Flags for the default `view` command.
    #[command(flatten)]
    pub view: ViewArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the viewer (the default)
    View(ViewArgs),
    /// Generate a review with the configured diff and LLM commands
    Generate {
        /// Working directory to review
        #[arg(long, default_value = ".")]
        dir: String,
        /// If the LLM leaves hunks out, write them to an "unclassified" section
        #[arg(long)]
        partial: bool,
    },
    /// Run only the HTTP ingest endpoint until interrupted
    Serve {
        /// Loopback port; 0 picks a free one
        #[arg(long, env = "HUNKWISE_PORT")]
        port: Option<u16>,
    },
    /// Print where the review of a directory is stored
    Path {
        #[arg(long, default_value = ".")]
        dir: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Working directory whose review to show
    #[arg(long, default_value = ".")]
    pub dir: String,
    /// Loopback port for the HTTP ingest endpoint; 0 picks a free one
    #[arg(long, env = "HUNKWISE_PORT")]
    pub port: Option<u16>,
    /// Do not start the HTTP ingest endpoint
    #[arg(long)]
    pub no_http: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_flags_mean_view() {
        let cli = Cli::try_parse_from(["hunkwise", "--dir", "/srv/repo", "--no-http"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.view.dir, "/srv/repo");
        assert!(cli.view.no_http);
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["hunkwise", "generate", "--partial"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Generate { partial: true, ref dir }) if dir == "."));

        let cli = Cli::try_parse_from(["hunkwise", "serve", "--port", "4100"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve { port: Some(4100) })));

        let cli = Cli::try_parse_from(["hunkwise", "view", "--port", "0"]).unwrap();
        assert!(matches!(cli.command, Some(Command::View(ViewArgs { port: Some(0), .. }))));
    }
}
