use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Turn curated requirements into user stories")]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Base URL of the generation service (overrides STORYFORGE_API_URL)
    #[clap(long, global = true)]
    pub api_url: Option<String>,

    /// Path to the config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Markdown,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interactive wizard (default)
    Wizard,

    /// Analyze requirements from a file without prompting
    Run {
        /// Project name
        #[clap(long)]
        name: String,

        /// Main objective of the project
        #[clap(long)]
        objective: String,

        /// Intended users
        #[clap(long, default_value = "")]
        audience: String,

        /// Additional context (technologies, constraints, integrations)
        #[clap(long, default_value = "")]
        context: String,

        /// File with one requirement per line ("-" reads stdin)
        #[clap(long, short = 'r')]
        requirements: PathBuf,

        /// Approve every requirement before analyzing
        #[clap(long, conflicts_with = "approve")]
        approve_all: bool,

        /// Approve only these positions (1-based, comma separated)
        #[clap(long, value_delimiter = ',')]
        approve: Vec<usize>,

        /// Write the report here instead of stdout
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Report format
        #[clap(long, value_enum, default_value = "markdown")]
        format: ReportFormat,

        /// Number of requirements analyzed at once (1 keeps list order)
        #[clap(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: u16,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective settings to the config file
        #[clap(long)]
        save: bool,
    },
}
