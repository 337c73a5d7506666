use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coderun", version, about = "Run code files and snippets through configurable executors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct Source {
    /// File to run (the active document)
    pub file: Option<PathBuf>,

    /// Run only these lines of the file, e.g. 3:10
    #[arg(long = "lines", value_name = "A:B")]
    pub lines: Option<String>,

    /// Read an untitled buffer from stdin instead of a file
    #[arg(long, conflicts_with = "file")]
    pub stdin: bool,

    /// Language id of the code (overrides detection)
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a file, a line range, or stdin
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        source: Source,

        /// Send the command to an interactive shell instead of capturing output
        #[arg(short = 't', long = "terminal")]
        terminal: bool,
    },

    /// Run the configured customCommand
    #[command(visible_alias = "c")]
    Custom {
        #[command(flatten)]
        source: Source,
    },

    /// List configured executors
    #[command(visible_alias = "ls")]
    Languages,

    /// Keep a session open and read run/custom/stop/quit commands from stdin
    Session {
        #[command(flatten)]
        source: Source,
    },
}
