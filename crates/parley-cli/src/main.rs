//! Parley dialogue tools.
//!
//! Provides the `parley` binary for working with dialogue graphs stored as
//! JSON snapshots: validate a file, print its outline or flowchart model,
//! play it through the simulator, or write the bundled demo dialogue.
//!
//! Every command goes through the same `EditEngine` load path the editor
//! uses, so a file accepted here is accepted there.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use parley_core::demo::demo_dialogue;
use parley_core::{DialogueGraph, NodeId, NodeKind, PointerId};
use parley_editor::sync::{FlowchartView, ScriptedConditions, Simulator, TreeOutline};
use parley_editor::{EditEngine, EditorConfig, ViewId};

/// Dialogue graph tools.
#[derive(Parser)]
#[command(name = "parley", about = "Dialogue graph tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a dialogue file and print a summary.
    Check {
        /// Path to the dialogue JSON file.
        file: PathBuf,
    },

    /// Print the dialogue as an indented outline.
    Outline {
        file: PathBuf,

        /// Node ids to show collapsed.
        #[arg(short, long)]
        collapse: Vec<u32>,
    },

    /// Print the flowchart model as JSON.
    Flowchart { file: PathBuf },

    /// Play the dialogue, picking replies by pointer id.
    Simulate {
        file: PathBuf,

        /// Reply pointer to choose at each step.
        #[arg(short, long)]
        choose: Vec<u32>,

        /// Condition scripts that fail; all others pass.
        #[arg(short, long)]
        fail: Vec<String>,
    },

    /// Write the demo dialogue.
    Demo {
        /// Output file (default: stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    // Logs go to stderr so command output stays machine-readable.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    tracing::debug!("running {:?}", cli.command);
    let exit_code = match cli.command {
        Commands::Check { file } => run_check(&file),
        Commands::Outline { file, collapse } => run_outline(&file, &collapse),
        Commands::Flowchart { file } => run_flowchart(&file),
        Commands::Simulate { file, choose, fail } => run_simulate(&file, &choose, fail),
        Commands::Demo { out } => run_demo(out.as_deref()),
    };
    process::exit(exit_code);
}

/// A failed command, carrying its exit code: 1 = bad request,
/// 2 = invalid dialogue, 3 = I/O error.
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Failure {
            code,
            message: message.into(),
        }
    }
}

fn report(result: Result<(), Failure>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(f) => {
            tracing::debug!(code = f.code, "command failed");
            eprintln!("Error: {}", f.message);
            f.code
        }
    }
}

/// Reads `path` and loads it into a fresh engine.
fn open(path: &Path) -> Result<EditEngine, Failure> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Failure::new(3, format!("failed to read '{}': {}", path.display(), e)))?;
    let graph: DialogueGraph = serde_json::from_str(&raw)
        .map_err(|e| Failure::new(3, format!("failed to parse '{}': {}", path.display(), e)))?;
    let engine = EditEngine::new(graph, EditorConfig::from_env())
        .map_err(|e| Failure::new(2, format!("invalid dialogue '{}': {}", path.display(), e)))?;
    tracing::debug!(
        "opened {} with {} nodes and {} pointers",
        path.display(),
        engine.graph().node_count(),
        engine.graph().pointer_count()
    );
    Ok(engine)
}

fn run_check(path: &Path) -> i32 {
    report(open(path).map(|engine| {
        let summary = serde_json::json!({
            "nodes": engine.graph().node_count(),
            "pointers": engine.graph().pointer_count(),
            "occurrences": engine.projection().len(),
            "links": engine.projection().occurrences().iter().filter(|o| o.is_link).count(),
            "fingerprint": engine.fingerprint().to_hex().to_string(),
        });
        println!("{}", summary);
    }))
}

fn run_outline(path: &Path, collapse: &[u32]) -> i32 {
    report(open(path).map(|engine| {
        let mut tree = TreeOutline::new(ViewId(0), engine.graph(), engine.projection());
        for id in collapse {
            tree.collapse(NodeId(*id));
        }
        print!("{}", tree.render());
    }))
}

fn run_flowchart(path: &Path) -> i32 {
    report(open(path).and_then(|engine| {
        let view = FlowchartView::new(ViewId(0), engine.config(), engine.graph(), engine.projection());
        let json = view
            .export()
            .map_err(|e| Failure::new(3, format!("failed to serialize flowchart: {}", e)))?;
        println!("{}", json);
        Ok(())
    }))
}

fn run_simulate(path: &Path, choices: &[u32], fail: Vec<String>) -> i32 {
    report(open(path).and_then(|engine| {
        let graph = engine.graph();
        let evaluator = fail
            .into_iter()
            .fold(ScriptedConditions::new(true), |c, script| c.with(script, false));
        let mut sim = Simulator::new(ViewId(0), Box::new(evaluator));
        if sim.start(graph).is_none() {
            return Err(Failure::new(1, "no opening entry passes its conditions"));
        }
        for choice in choices {
            sim.choose(graph, PointerId(*choice))
                .map_err(|e| Failure::new(1, e.to_string()))?;
        }
        for line in sim.transcript() {
            let speaker = line.speaker.as_deref().unwrap_or(match line.kind {
                NodeKind::Entry => "NPC",
                NodeKind::Reply => "Player",
            });
            println!("{}: {}", speaker, line.text);
        }
        for reply in sim.replies(graph) {
            println!("  [{}] {}", reply.pointer, reply.text);
        }
        Ok(())
    }))
}

fn run_demo(out: Option<&Path>) -> i32 {
    let result = demo_dialogue()
        .map_err(|e| Failure::new(2, format!("demo dialogue is invalid: {}", e)))
        .and_then(|graph| {
            serde_json::to_string_pretty(&graph)
                .map_err(|e| Failure::new(3, format!("failed to serialize demo: {}", e)))
        })
        .and_then(|json| match out {
            Some(path) => std::fs::write(path, json)
                .map_err(|e| Failure::new(3, format!("failed to write '{}': {}", path.display(), e))),
            None => {
                println!("{}", json);
                Ok(())
            }
        });
    report(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_failure() {
        let code = run_check(Path::new("/nonexistent/dialogue.json"));
        assert_eq!(code, 3);
    }

    #[test]
    fn report_maps_failures_to_their_code() {
        assert_eq!(report(Ok(())), 0);
        assert_eq!(report(Err(Failure::new(2, "bad graph"))), 2);
    }

    #[test]
    fn simulate_arguments_parse() {
        let cli = Cli::try_parse_from(["parley", "simulate", "d.json", "-c", "1", "-c", "8", "-f", "gc_check_skill"])
            .unwrap();
        match cli.command {
            Commands::Simulate { file, choose, fail } => {
                assert_eq!(file, PathBuf::from("d.json"));
                assert_eq!(choose, vec![1, 8]);
                assert_eq!(fail, vec!["gc_check_skill".to_string()]);
            }
            other => panic!("parsed as {:?}", other),
        }
    }
}
