//! Flowgraph command-line tools.
//!
//! Provides the `flowgraph` binary for working with pipeline sources offline:
//! `instrument` rewrites a source the way a session does before upload,
//! `extract` runs the host-side graph extraction, and `frames` pulls a graph
//! or timings frame out of captured program output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use flowgraph_core::{extract_frame, strip_frames, FrameKind, PipelineGraph};
use flowgraph_source::{instrument, try_extract_graph};

/// Pipeline graph tools.
#[derive(Parser)]
#[command(name = "flowgraph", about = "Pipeline graph extraction tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the instrumented form of a Python source.
    Instrument {
        /// Python source file.
        file: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract the pipeline graph of a Python source as JSON.
    Extract {
        /// Python source file.
        file: PathBuf,
    },
    /// Decode or strip marker frames in captured program output.
    Frames {
        /// File holding the captured stdout.
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "graph")]
        kind: Kind,

        /// Print the output with every frame of this kind removed.
        #[arg(long)]
        strip: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Graph,
    Timings,
}

impl From<Kind> for FrameKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Graph => FrameKind::Graph,
            Kind::Timings => FrameKind::Timings,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Instrument { file, output } => run_instrument(&file, output.as_deref()),
        Commands::Extract { file } => run_extract(&file),
        Commands::Frames { file, kind, strip } => run_frames(&file, kind.into(), strip),
    };
    process::exit(exit_code);
}

fn read_source(path: &Path) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })
}

/// Returns exit code: 0 = success, 3 = I/O error.
fn run_instrument(path: &Path, output: Option<&Path>) -> i32 {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let instrumented = instrument(&source);
    match output {
        Some(out) => match fs::write(out, instrumented) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: failed to write '{}': {}", out.display(), e);
                3
            }
        },
        None => {
            print!("{}", instrumented);
            0
        }
    }
}

/// Prints the graph JSON, carrying the error message when extraction fails.
///
/// Returns exit code: 0 = success, 1 = extraction error, 3 = I/O error.
fn run_extract(path: &Path) -> i32 {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let (graph, code) = match try_extract_graph(&source) {
        Ok(graph) => (graph, 0),
        Err(e) => {
            eprintln!("Extraction error: {}", e);
            (PipelineGraph::failed(e.to_string()), 1)
        }
    };
    print_json(&graph);
    code
}

/// Returns exit code: 0 = success, 1 = no complete frame, 3 = I/O error.
fn run_frames(path: &Path, kind: FrameKind, strip: bool) -> i32 {
    let buffer = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if strip {
        print!("{}", strip_frames(&buffer, kind));
        return 0;
    }
    match extract_frame::<serde_json::Value>(&buffer, kind) {
        Some(payload) => {
            print_json(&payload);
            0
        }
        None => {
            eprintln!("Error: no complete {} frame found", kind.begin());
            1
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize: {}\"}}", e));
    println!("{}", json);
}
