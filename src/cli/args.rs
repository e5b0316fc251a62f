//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Server-side HTML component composition: expand custom tags in pages with component templates
#[derive(Parser, Debug)]
#[command(name = "reago")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file replacing ./reago.toml
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Component template directory
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub components: Option<PathBuf>,

    /// Page directory
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub pages: Option<PathBuf>,

    /// TOML file exposed to templates as `data`
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render one page to stdout or a file
    Render {
        /// Page file
        #[arg(value_hint = ValueHint::FilePath)]
        page: PathBuf,
        /// Write output here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Show which page file a request path maps to
    Resolve {
        /// Request path, e.g. /about
        request_path: String,
    },

    /// Render the page a request path maps to
    ServePath {
        /// Request path, e.g. /about
        request_path: String,
    },

    /// Render every page into an output directory
    Build {
        /// Output directory
        #[arg(value_hint = ValueHint::DirPath)]
        out_dir: PathBuf,
    },

    /// List registered components
    Components,

    /// Show the element outline of a page after composition
    Outline {
        /// Page file
        #[arg(value_hint = ValueHint::FilePath)]
        page: PathBuf,
    },

    /// Show effective configuration
    Config,

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
