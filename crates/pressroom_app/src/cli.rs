use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pressroom_logging::LogDestination;

#[derive(Parser, Debug)]
#[command(name = "pressroom")]
#[command(author, version, about = "Turns a document or web page into a published article", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline for one document
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// RON settings file (defaults to ./pressroom.ron when present)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Directory for uploads, intermediate artifacts and drafts
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the post to the output directory instead of publishing it
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Local HTML, Markdown or text file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Web page to ingest
    #[arg(short, long)]
    pub url: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["pressroom", "run"]).is_err());
        assert!(Cli::try_parse_from(["pressroom", "run", "--file", "a.html", "--url", "https://x.test"]).is_err());

        let cli = Cli::try_parse_from(["pressroom", "run", "--url", "https://x.test/a", "--dry-run", "--log", "both"])
            .unwrap();
        let Command::Run(args) = cli.command;
        assert_eq!(args.source.url.as_deref(), Some("https://x.test/a"));
        assert!(args.dry_run);
        assert_eq!(args.log, LogTarget::Both);
    }
}
