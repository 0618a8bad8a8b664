//! CLI module for Lectern.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lectern - hybrid search over video lecture transcripts
///
/// Indexes timestamped transcripts and answers queries with merged,
/// context-expanded clips ranked by keyword and semantic relevance.
#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "LECTERN_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index videos from a JSON transcript file
    Index {
        /// JSON file with a list of videos and their transcripts
        file: String,
    },

    /// Rebuild the keyword index from the stored fragments
    Rebuild,

    /// Search indexed lectures for relevant clips
    Search {
        /// Search query
        query: String,

        /// Maximum number of clips (defaults to search.default_top_k)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List indexed videos
    List,

    /// Remove a video from the index
    Remove {
        /// Video ID to remove
        video_id: String,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
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

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["lectern", "-vv", "search", "binary trees", "-l", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "binary trees");
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
