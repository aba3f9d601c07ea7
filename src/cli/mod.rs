//! CLI command definitions and parsing
use crate::indexer::BuildStage;
use crate::retrieval::SearchMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lexica",
    version,
    author = "neur0map",
    about = "Hybrid search over chat transcripts",
    long_about = "Lexica builds BM25, hashed-trigram and message-graph artifacts for a chat corpus \
                  and answers queries by fusing lexical, semantic, graph authority and content signals."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/lexica/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage stored corpora
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Build artifacts for a corpus
    Build {
        /// Corpus id
        corpus: String,

        /// Stage to build
        #[arg(short, long, value_enum, default_value_t = BuildStage::All)]
        stage: BuildStage,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a corpus
    Search {
        /// Corpus id
        corpus: String,

        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'k', long, default_value = "10")]
        limit: usize,

        /// Ranking mode
        #[arg(short, long, value_enum, default_value_t = SearchMode::Hybrid)]
        mode: SearchMode,

        /// Only messages by this role (user or assistant)
        #[arg(long)]
        role: Option<String>,

        /// Only messages with (true) or without (false) code
        #[arg(long)]
        has_code: Option<bool>,

        /// Earliest timestamp, RFC 3339 or YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        after: Option<String>,

        /// Latest timestamp, RFC 3339 or YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        before: Option<String>,

        /// Only messages of this conversation
        #[arg(long, value_name = "CONV_ID")]
        conv: Option<String>,

        /// Include raw per-signal values
        #[arg(long)]
        explain: bool,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the messages of one conversation
    Conversation {
        /// Corpus id
        corpus: String,

        /// Conversation id
        conv_id: String,

        /// Message to center the window on
        #[arg(long, value_name = "MSG")]
        center: Option<u32>,

        /// Messages shown on each side of the center
        #[arg(short, long, default_value = "15")]
        window: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CorpusAction {
    /// Import a JSON-lines file of messages as a new corpus
    Import {
        /// Path to the rows file
        rows: PathBuf,

        /// Corpus id (defaults to a generated id)
        #[arg(long)]
        id: Option<String>,
    },

    /// List stored corpora
    List {
        #[arg(long)]
        json: bool,
    },

    /// List the artifacts of one corpus
    Ls {
        /// Corpus id
        corpus: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

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
    fn test_search_arguments() {
        let cli = Cli::try_parse_from([
            "lexica",
            "search",
            "abc123",
            "parse json",
            "-k",
            "5",
            "--mode",
            "snippets",
            "--has-code",
            "true",
            "--after",
            "2024-01-01",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                corpus,
                query,
                limit,
                mode,
                has_code,
                after,
                ..
            } => {
                assert_eq!(corpus, "abc123");
                assert_eq!(query, "parse json");
                assert_eq!(limit, 5);
                assert_eq!(mode, SearchMode::Snippets);
                assert_eq!(has_code, Some(true));
                assert_eq!(after.as_deref(), Some("2024-01-01"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_build_defaults_to_all() {
        let cli = Cli::try_parse_from(["lexica", "build", "abc123"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Build {
                stage: BuildStage::All,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["lexica", "-v", "build", "abc123", "--stage", "graph"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Build {
                stage: BuildStage::Graph,
                ..
            }
        ));
    }
}
