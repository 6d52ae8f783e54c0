pub mod run;
pub mod schema;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slidegen")]
#[command(
    author,
    version,
    about = "Generate slide images from a markdown outline and combine them into a PDF"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate slide images and the combined PDF
    Run(RunArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Markdown outline; every `## ` heading is one slide
    #[arg(long)]
    pub outline: PathBuf,

    /// Style reference image applied to every slide
    #[arg(long)]
    pub style: Option<PathBuf>,

    /// Image variants per slide
    #[arg(long)]
    pub copies: Option<u32>,

    /// Slides to generate, e.g. '1', '1,3,5', '2-4', '1,3-5,7' (default: all)
    #[arg(long)]
    pub pages: Option<String>,

    /// Generate the first slide only, to check the look before a full run
    #[arg(long, conflicts_with = "pages")]
    pub preview: bool,

    /// Output directory (default: ./output_YYYYMMDD_HHMMSS)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Article file or glob (.md, .markdown) sent as background context; repeatable
    #[arg(long = "article", value_name = "PATH|GLOB")]
    pub articles: Vec<String>,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Image model to request
    #[arg(long, env = "OPENROUTER_MODEL")]
    pub model: Option<String>,

    /// HTTP/HTTPS/SOCKS5 proxy URL
    #[arg(long, env = "OPENROUTER_PROXY")]
    pub proxy: Option<String>,

    /// Override max in-flight generation requests
    #[arg(long, env = "OPENROUTER_MAX_CONCURRENT")]
    pub concurrency: Option<usize>,

    /// Path to config file [default: slidegen.yaml, if present]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show plan without calling the generation service
    #[arg(long)]
    pub dry_run: bool,
}
