use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use tracetree_tui::{TimelineConfig, TraceOutput, load_trace};

#[derive(ClapParser)]
#[command(name = "tracetree-tui")]
#[command(about = "Build call trees from execution traces and explore them on a timeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a trace file and print the call tree as JSON
    Parse {
        /// Input trace file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Pretty print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Include per-method analysis metrics
        #[arg(short, long)]
        analysis: bool,
    },

    /// Open the interactive timeline for a trace file
    View {
        /// Input trace file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Timeline config (default: <config dir>/tracetree-tui/config.json)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Smallest time span in nanoseconds the view may zoom to
        #[arg(long, value_name = "N")]
        min_visible_ns: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            input,
            output,
            pretty,
            analysis,
        } => {
            env_logger::Builder::new()
                .target(env_logger::Target::Stderr)
                .parse_default_env()
                .init();
            parse_file(&input, output, pretty, analysis);
        }
        Commands::View {
            input,
            config,
            min_visible_ns,
        } => {
            view_file(&input, config, min_visible_ns);
        }
    }
}

fn parse_file(input: &Path, output: Option<PathBuf>, pretty: bool, analysis: bool) {
    let loaded = match load_trace(input) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("Error parsing file: {}", err);
            std::process::exit(1);
        }
    };

    if loaded.tree.is_empty() {
        eprintln!("Error: no trace events found in {}", input.display());
        std::process::exit(1);
    }
    if !loaded.errors.is_empty() {
        log::warn!("Skipped {} malformed lines", loaded.errors.len());
    }

    let output_data = TraceOutput::from_loaded(&loaded, analysis);

    // Serialize to JSON
    let json = if pretty {
        serde_json::to_string_pretty(&output_data)
    } else {
        serde_json::to_string(&output_data)
    };

    let json = match json {
        Ok(j) => j,
        Err(err) => {
            eprintln!("Error serializing to JSON: {}", err);
            std::process::exit(1);
        }
    };

    // Write output
    if let Some(output_path) = output {
        if let Err(err) = std::fs::write(&output_path, json) {
            eprintln!("Error writing to {}: {}", output_path.display(), err);
            std::process::exit(1);
        }
        eprintln!("Output written to {}", output_path.display());
    } else {
        println!("{}", json);
    }
}

fn view_file(input: &Path, config_path: Option<PathBuf>, min_visible_ns: Option<u64>) {
    let mut config = match TimelineConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading config: {}", err);
            std::process::exit(1);
        }
    };
    if let Some(min_visible_ns) = min_visible_ns {
        config.min_visible_ns = min_visible_ns;
    }

    if let Err(err) = tracetree_tui::tui::run_tui(input, config) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
