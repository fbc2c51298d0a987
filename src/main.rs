use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use scriven::build::{self, build_site};
use scriven::config::{Config, SITE_CONFIG_FILE};
use scriven::serve::serve;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// A static site generator for Markdown blogs.
#[derive(Debug, Parser)]
#[command(name = "scriven", version)]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the site in the current directory.
    Build {
        /// The site configuration file.
        #[arg(short, long, default_value = SITE_CONFIG_FILE)]
        config: PathBuf,

        /// The directory to write the site to. It is deleted first.
        #[arg(short, long, default_value = "public")]
        output: PathBuf,

        /// Document parser threads; 0 uses one per CPU.
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },

    /// Serve a built site on localhost.
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// The directory to serve.
        #[arg(short, long, default_value = "public")]
        dir: PathBuf,
    },

    /// Create a new draft document.
    New {
        /// The document's title.
        #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
        title: String,
    },
}

fn init_tracing(cli: &Cli) {
    let level = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "warn",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            config,
            output,
            threads,
        } => {
            let threads = match threads {
                0 => num_cpus::get(),
                n => n,
            };
            let config = Config::new(Path::new("."), &config, &output).with_threads(threads);
            let summary = build_site(&config).context("building site")?;
            if summary.asset_error.is_some() {
                warn!("static assets were not fully copied");
            }
            println!(
                "Built {} documents and {} static files into {}",
                summary.documents,
                summary.assets,
                config.output_directory.display()
            );
        }
        Command::Serve { port, dir } => {
            serve(&dir, port).context("serving site")?;
        }
        Command::New { title } => {
            let path = build::create_document(&title).context("creating document")?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
