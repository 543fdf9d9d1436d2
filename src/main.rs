use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use std::rc::Rc;

use qgenlink::correlator::break_command;
use qgenlink::model::{Item, ItemKind};
use qgenlink::project::PROJECT_FILE;
use qgenlink::workflow::WorkflowKind;
use qgenlink::{
    DebugSession, Orchestrator, Project, Studio, TokioRunner, Toolchain, TracingConsole,
    WorkflowRun,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulink diagrams, QGen code generation and block/line mapping", long_about = None)]
struct Cli {
    /// Project file
    #[arg(short = 'P', long, value_name = "FILE", default_value = PROJECT_FILE)]
    project: Utf8PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a model (or open a .mdl.json file) and print its diagrams
    View {
        file: Utf8PathBuf,
        /// Run a navigation command before printing, e.g. 'showdiagram("Sub")'
        #[arg(long)]
        action: Option<String>,
    },
    /// Generate code for the given model files, or for the whole project
    Generate { files: Vec<Utf8PathBuf> },
    /// Generate code for all models, then build MAIN
    Build {
        main: String,
        /// Start the debugger on the executable once built
        #[arg(long)]
        debug: bool,
    },
    /// List the blocks that generated a source line
    Blocks { source: Utf8PathBuf, line: u32 },
    /// Print the debugger commands setting breakpoints on a block
    Breakpoints { block: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let status = runtime.block_on(run(cli))?;
    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<i32> {
    let project = Project::load(&cli.project)?;
    let toolchain = Toolchain::discover(&project);
    let orchestrator = Orchestrator::new(toolchain, TokioRunner);
    let console = Rc::new(TracingConsole);
    let mut studio = Studio::new(project, orchestrator, console.clone());

    match cli.command {
        Command::View { file, action } => {
            let file = absolute(studio.project().root(), &file);
            let Some(id) = studio.open_file(&file).await? else {
                bail!("{file} is neither a model nor a diagram file");
            };
            let viewer = studio
                .viewers_mut()
                .get_mut(id)
                .context("viewer vanished")?;
            if !viewer.is_ready() {
                bail!("no diagram could be loaded for {file}");
            }
            if let Some(action) = action {
                viewer.execute_command(&action, &*console);
            }
            print_viewer(viewer.title(), viewer.current_index(), viewer.diagrams());
            Ok(0)
        }
        Command::Generate { files } => {
            let run = if files.is_empty() {
                studio.generate_for_project().await?
            } else {
                let files: Vec<Utf8PathBuf> = files
                    .iter()
                    .map(|f| absolute(studio.project().root(), f))
                    .collect();
                studio.generate_for_files(&files).await?
            };
            report(&run);
            Ok(run.status)
        }
        Command::Build { main, debug } => {
            let kind = if debug {
                WorkflowKind::GenerateThenBuildThenDebug
            } else {
                WorkflowKind::GenerateThenBuild
            };
            let run = studio.run_workflow(kind, &main).await?;
            report(&run);
            Ok(run.status)
        }
        Command::Blocks { source, line } => {
            let session = DebugSession::start(studio.project(), &*console);
            let source = absolute(studio.project().root(), &source);
            let blocks = session.mapping().get_blocks(&source, line);
            match session.mapping().get_model_file(&source) {
                Some(model) => println!("{source} was generated from {model}"),
                None => println!("{source} was not generated from a model"),
            }
            for b in blocks {
                println!("{b}");
            }
            Ok(0)
        }
        Command::Breakpoints { block } => {
            let session = DebugSession::start(studio.project(), &*console);
            let locations = session.mapping().get_breakpoints(&block);
            if locations.is_empty() {
                println!("No breakpoint for '{block}'");
                return Ok(1);
            }
            for loc in &locations {
                println!("{}", break_command(loc));
            }
            Ok(0)
        }
    }
}

fn absolute(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    path.canonicalize_utf8().unwrap_or_else(|_| root.join(path))
}

fn report(run: &WorkflowRun) {
    for stage in &run.stages {
        println!("{:>4}  {}", stage.status, stage.stage);
    }
    println!("{}: status {}", run.kind, run.status);
}

fn print_viewer(
    title: &str,
    current: Option<usize>,
    diagrams: Option<&qgenlink::DiagramCollection>,
) {
    let Some(diagrams) = diagrams else {
        return;
    };
    println!("{title}");
    for (idx, diagram) in diagrams.diagrams().iter().enumerate() {
        let marker = if Some(idx) == current { '*' } else { ' ' };
        println!("{marker} [{idx}] {}", diagram.name);
        for item in &diagram.items {
            print_item(item, 2);
        }
    }
}

fn print_item(item: &Item, depth: usize) {
    let indent = "  ".repeat(depth);
    let action = item
        .on_double_click
        .as_ref()
        .map(|a| format!("  -> {a:?}"))
        .unwrap_or_default();
    match &item.kind {
        ItemKind::Block(id) => println!("{indent}{id}{action}"),
        ItemKind::Container if !item.children.is_empty() || !action.is_empty() => {
            println!("{indent}(group){action}")
        }
        ItemKind::Container => {}
    }
    for child in &item.children {
        print_item(child, depth + 1);
    }
}
