//! DocForge CLI - workspace validation and planning
//!
//! Commands: check-structure, check-content, plan
//! Text report (or JSON with --json) to stdout, logs to stderr
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use docforge_core::{ContentCheckRequest, DocPipeline, Error, PlanOutcome, PlanRequest};

#[derive(Parser)]
#[command(name = "docforge-cli")]
#[command(about = "DocForge CLI - Multilingual Documentation Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root (holds config.yaml)
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Print the structured result as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the document structure file
    CheckStructure {
        /// Apply fixable corrections, save, and re-validate
        #[arg(long)]
        fix: bool,
    },

    /// Validate document folders, metadata and content
    CheckContent {
        /// Document path to check (repeatable); all documents when omitted
        #[arg(long = "doc")]
        docs: Vec<String>,

        /// Also check image slot markers
        #[arg(long)]
        check_slots: bool,

        /// Probe remote images over HTTP
        #[arg(long)]
        probe_remote: bool,
    },

    /// Plan translation (or image) work
    Plan {
        /// Target language (repeatable)
        #[arg(long = "lang", required = true)]
        langs: Vec<String>,

        /// Document path to plan (repeatable); all documents when omitted
        #[arg(long = "doc")]
        docs: Vec<String>,

        /// Ignore recorded hashes
        #[arg(long)]
        force: bool,

        /// Plan image slots instead of documents
        #[arg(long)]
        images: bool,
    },
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize result: {e}"),
        }
    } else {
        print!("{}", text());
    }
}

fn report_error(json: bool, err: &Error) -> ExitCode {
    if json {
        let output = serde_json::json!({
            "valid": false,
            "category": err.category(),
            "error": err.to_string(),
        });
        println!("{output}");
    } else {
        eprintln!("error: {err}");
    }
    ExitCode::FAILURE
}

fn exit_for(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render_plan<T>(outcome: &PlanOutcome<T>, line: impl Fn(&T) -> String) -> String {
    match outcome {
        PlanOutcome::Skipped { reason } => format!("Nothing to plan ({reason:?})\n"),
        PlanOutcome::Planned { tasks } => {
            let mut out = format!("{} task(s)\n", tasks.len());
            for task in tasks {
                out.push_str(&format!("  {}\n", line(task)));
            }
            out
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    let pipeline = DocPipeline::open(&cli.workspace).await?;

    match cli.command {
        Commands::CheckStructure { fix } => {
            let outcome = pipeline.check_structure(fix).await?;
            emit(cli.json, &outcome, || outcome.render());
            Ok(exit_for(outcome.report.valid))
        }

        Commands::CheckContent { docs, check_slots, probe_remote } => {
            let request = ContentCheckRequest {
                documents: (!docs.is_empty()).then_some(docs),
                check_slots,
                probe_remote,
            };
            let report = pipeline.check_content(&request).await?;
            emit(cli.json, &report, || report.render());
            Ok(exit_for(report.valid))
        }

        Commands::Plan { langs, docs, force, images } => {
            let request = PlanRequest {
                documents: (!docs.is_empty()).then_some(docs),
                target_languages: langs,
                force,
            };
            if images {
                let outcome = pipeline.plan_images(&request).await?;
                emit(cli.json, &outcome, || {
                    render_plan(&outcome, |t| {
                        format!("{} [{}] {} -> {:?}", t.key, t.document, t.target_language, t.decision)
                    })
                });
            } else {
                let outcome = pipeline.plan_translations(&request).await?;
                emit(cli.json, &outcome, || {
                    render_plan(&outcome, |t| {
                        format!("{} {} -> {}", t.path, t.source_language, t.target_language)
                    })
                });
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    match run(cli).await {
        Ok(code) => code,
        Err(e) => report_error(json, &e),
    }
}
