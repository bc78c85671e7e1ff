//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "shaikh",
    version,
    author = "awbalessa",
    about = "Hybrid semantic and lexical retrieval over tafsir passages",
    long_about = "Shaikh answers decomposed questions over a corpus of Quranic commentary by running \
                  filtered vector and keyword search for every sub-query concurrently and merging the \
                  two ranked lists with Reciprocal Rank Fusion."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/shaikh/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a corpus and run a hybrid search request against it
    Search {
        /// JSONL corpus, one passage per line
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// JSON search request with raw_prompt, sub_queries and final_k
        #[arg(short, long, value_name = "FILE")]
        request: PathBuf,

        /// Print only the deduplicated flat ranking
        #[arg(long)]
        flat: bool,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate a search request and show its filter modes and labels
    Validate {
        /// JSON search request
        #[arg(short, long, value_name = "FILE")]
        request: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "shaikh",
            "search",
            "--corpus",
            "tafsir.jsonl",
            "-r",
            "request.json",
            "--json",
            "--profile",
            "english",
        ])
        .unwrap();

        assert_eq!(cli.profile.as_deref(), Some("english"));
        match cli.command {
            Commands::Search {
                corpus, json, flat, ..
            } => {
                assert_eq!(corpus, PathBuf::from("tafsir.jsonl"));
                assert!(json);
                assert!(!flat);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
