use crate::commands::{handle_dump, handle_index, handle_query, handle_stats};
use crate::config::{IndexerConfig, DEFAULT_DB_PATH};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stubidx")]
#[command(about = "Incremental stub indexer for Java sources")]
#[command(version)]
pub struct Cli {
    /// Database path (default: .stub-index.db)
    #[arg(short = 'D', long = "db", global = true)]
    pub database: Option<String>,

    /// Project root (default: current directory)
    #[arg(short = 'P', long = "project", global = true)]
    pub project_root: Option<String>,

    /// Worker threads (default: all cores)
    #[arg(short = 't', long = "threads", global = true, default_value_t = 0)]
    pub threads: usize,

    /// Verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build or update the stub index [aliases: idx, i]
    #[command(visible_alias = "idx", visible_alias = "i")]
    Index {
        /// Discard cached stubs and rebuild everything
        #[arg(short = 'f', long = "force")]
        force: bool,
    },

    /// Look a key up in a stub index [aliases: q]
    #[command(visible_alias = "q")]
    Query {
        /// Index name, e.g. java.class.shortName
        #[arg(value_name = "INDEX")]
        index: String,

        /// Key to look up
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print the stored stub tree of a file [aliases: tree]
    #[command(visible_alias = "tree")]
    Dump {
        /// File path relative to the project root
        #[arg(value_name = "FILE")]
        file: String,

        /// Output as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Show cache statistics
    Stats,
}

impl Cli {
    pub fn config(&self) -> IndexerConfig {
        let project_root = self.project_root.clone().unwrap_or_else(|| ".".to_string());
        let db_path = self
            .database
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&project_root).join(DEFAULT_DB_PATH));
        IndexerConfig::new(project_root)
            .with_db(db_path)
            .with_threads(self.threads)
    }

    pub fn run(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Index { force } => handle_index(&config, force)?,
            Commands::Query { index, key } => handle_query(&config, &index, &key)?,
            Commands::Dump { file, json } => handle_dump(&config, &file, json)?,
            Commands::Stats => handle_stats(&config)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_alias() {
        let cli = Cli::try_parse_from(["stubidx", "-P", "/project", "idx", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Index { force: true }));
        let config = cli.config();
        assert_eq!(config.project_root, PathBuf::from("/project"));
        assert_eq!(config.db_path, PathBuf::from("/project/.stub-index.db"));
    }

    #[test]
    fn test_parse_query_with_global_flags() {
        let cli = Cli::try_parse_from([
            "stubidx",
            "q",
            "java.class.shortName",
            "Pair",
            "--db",
            "/tmp/x.db",
            "-t",
            "2",
        ])
        .unwrap();
        match &cli.command {
            Commands::Query { index, key } => {
                assert_eq!(index, "java.class.shortName");
                assert_eq!(key, "Pair");
            }
            _ => panic!("expected query"),
        }
        let config = cli.config();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.threads, 2);
    }

    #[test]
    fn test_dump_requires_file() {
        assert!(Cli::try_parse_from(["stubidx", "dump"]).is_err());
    }
}
