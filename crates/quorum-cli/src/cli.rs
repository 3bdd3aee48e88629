use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "quorum",
    about = "Quorum: merge records for the same entities across many sources",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every source in a pipeline and print merged records
    Run(RunArgs),
    /// Validate a pipeline file and show source priority
    Check(CheckArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline configuration file
    #[arg(short, long)]
    pub config: PathBuf,
    /// Principal for sources that need an authenticated session
    #[arg(long, requires = "token")]
    pub principal: Option<String>,
    /// Bearer token for sources that need an authenticated session
    #[arg(long, requires = "principal")]
    pub token: Option<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Pipeline configuration file
    #[arg(short, long)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run() {
        let cli = Cli::try_parse_from(["quorum", "run", "--config", "p.toml"]).unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.config, PathBuf::from("p.toml"));
            assert!(args.principal.is_none());
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_run_with_session() {
        let cli = Cli::try_parse_from([
            "quorum", "run", "-c", "p.toml", "--principal", "loader", "--token", "t0k",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.principal.as_deref(), Some("loader"));
            assert_eq!(args.token.as_deref(), Some("t0k"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn token_requires_principal() {
        assert!(Cli::try_parse_from(["quorum", "run", "-c", "p.toml", "--token", "t"]).is_err());
        assert!(
            Cli::try_parse_from(["quorum", "run", "-c", "p.toml", "--principal", "p"]).is_err()
        );
    }

    #[test]
    fn parse_check() {
        let cli = Cli::try_parse_from(["quorum", "check", "-c", "p.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Check(_)));
    }

    #[test]
    fn parse_global_flags() {
        let cli =
            Cli::try_parse_from(["quorum", "check", "-c", "p.toml", "--format", "json", "-v"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["quorum", "run"]).is_err());
    }
}
