//! bloom-epub - publish Bloom books as ePub 3 packages

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::PublishArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse and validate jobs argument (must be at least 1)
fn parse_jobs(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if n < 1 {
        Err("jobs must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

#[derive(Parser)]
#[command(name = "bloom-epub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a book folder as an .epub file
    Publish {
        /// Book folder
        book: String,

        /// Output file path (defaults to "<book>.epub" next to the book folder)
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        args: PublishArgs,
    },

    /// Stage a book folder without zipping it, as a preview would
    Stage {
        /// Book folder
        book: String,

        /// Also bundle the staged folder into this tar file
        #[arg(long)]
        bundle: Option<String>,

        #[command(flatten)]
        args: PublishArgs,
    },

    /// List installed font families and whether they can be embedded
    Fonts {
        /// Extra font folder to scan (repeatable)
        #[arg(long = "font-dir")]
        font_dirs: Vec<String>,

        /// Skip the platform font folders
        #[arg(long)]
        no_system_fonts: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display information about a book folder
    Info {
        /// Book folder
        book: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish every book folder inside a directory
    Batch {
        /// Directory holding book folders
        input_dir: String,

        /// Output directory
        #[arg(short, long)]
        output_dir: String,

        /// Number of parallel jobs (must be at least 1)
        #[arg(short, long, default_value = "4", value_parser = parse_jobs)]
        jobs: usize,

        #[command(flatten)]
        args: PublishArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "bloom_epub_cli=debug,bloom_epub_core=debug"
    } else {
        "bloom_epub_cli=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Publish { book, output, args } => {
            commands::publish(&book, output.as_deref(), &args).await
        }

        Commands::Stage { book, bundle, args } => commands::stage(&book, bundle.as_deref(), &args).await,

        Commands::Fonts {
            font_dirs,
            no_system_fonts,
            json,
        } => commands::fonts(&font_dirs, !no_system_fonts, json),

        Commands::Info { book, json } => commands::info(&book, json),

        Commands::Batch {
            input_dir,
            output_dir,
            jobs,
            args,
        } => commands::batch(&input_dir, &output_dir, jobs, &args),
    }
}
