use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "mapping-finder")]
#[command(about = "Resolve and search Minecraft obfuscation mappings per release version")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, value_name = "DIR")]
    pub data: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Ingest one version's raw export bundle (zip archive or directory).
    Ingest {
        version: String,

        bundle: PathBuf,

        #[arg(long, value_name = "ID")]
        snapshot: Option<String>,
    },
    /// Search loaded mappings by name.
    Search {
        term: String,

        #[arg(long, value_name = "VER", default_value = "latest")]
        mc: String,

        #[arg(short = 'k', long, value_enum, default_value_t = SearchKind::All)]
        kind: SearchKind,

        #[arg(long, default_value_t = 0, value_name = "N")]
        page: usize,

        #[arg(long, default_value_t = 5, value_name = "N")]
        page_size: usize,
    },
    Versions,
    Stats,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum SearchKind {
    All,
    Field,
    Method,
    Param,
    Class,
}
