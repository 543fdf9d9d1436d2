//! Multi-stage operations: generate code, then build, then debug.
//!
//! Every stage is one external process. A stage only starts after the
//! previous one exited with status 0; the first non-zero status ends the
//! workflow and becomes its final status. Statuses are values, not errors:
//! the only error is a process that could not be started at all.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

use crate::console::Console;
use crate::project::{Project, is_model_file};
use crate::toolchain::{CommandLine, Orchestrator, ProcessError, ProcessRunner, RunMode};

/// Exit status of a stage or workflow; 0 means success.
pub type Status = i32;

pub const SUCCESS: Status = 0;

/// Final status of a compile workflow that had no model file to process.
pub const NOTHING_GENERATED: Status = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    CompileFile,
    /// Several selected files in one run.
    CompileFiles,
    CompileProject,
    GenerateThenBuild,
    GenerateThenBuildThenDebug,
}

impl WorkflowKind {
    pub fn name(self) -> &'static str {
        match self {
            WorkflowKind::CompileFile => "generate-code-for-file",
            WorkflowKind::CompileFiles => "generate-code-for-files",
            WorkflowKind::CompileProject => "generate-code-for-project",
            WorkflowKind::GenerateThenBuild => "generate-from-mdl-then-build",
            WorkflowKind::GenerateThenBuildThenDebug => "generate-from-mdl-then-build-then-debug",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Generate(Utf8PathBuf),
    Build(String),
    Debug(Utf8PathBuf),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Generate(model) => write!(f, "generate {model}"),
            Stage::Build(main) => write!(f, "build {main}"),
            Stage::Debug(exe) => write!(f, "debug {exe}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: Status,
}

/// Stages a workflow went through, in order, with their statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub kind: WorkflowKind,
    pub stages: Vec<StageRecord>,
    pub status: Status,
    /// Whether the project was recomputed after code generation.
    pub reloaded: bool,
}

impl WorkflowRun {
    fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            stages: Vec::new(),
            status: SUCCESS,
            reloaded: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == SUCCESS
    }

    pub fn generated(&self) -> impl Iterator<Item = &Utf8Path> {
        self.stages.iter().filter_map(|r| match &r.stage {
            Stage::Generate(model) => Some(model.as_path()),
            _ => None,
        })
    }
}

/// Everything a workflow touches. Holding `&mut Project` for the duration
/// of a run keeps stage continuations strictly sequential.
pub struct Workflows<'a, R> {
    orchestrator: &'a Orchestrator<R>,
    project: &'a mut Project,
    console: &'a dyn Console,
}

impl<'a, R: ProcessRunner> Workflows<'a, R> {
    pub fn new(
        orchestrator: &'a Orchestrator<R>,
        project: &'a mut Project,
        console: &'a dyn Console,
    ) -> Self {
        Self {
            orchestrator,
            project,
            console,
        }
    }

    /// Generate code for the model files among `files`, in order, stopping at
    /// the first failure. On full success the project is recomputed once.
    pub async fn compile(&mut self, files: &[Utf8PathBuf]) -> Result<WorkflowRun, ProcessError> {
        let kind = if files.len() == 1 {
            WorkflowKind::CompileFile
        } else {
            WorkflowKind::CompileFiles
        };
        let mut run = WorkflowRun::new(kind);
        self.compile_into(&mut run, files).await?;
        Ok(run)
    }

    pub async fn compile_project(&mut self) -> Result<WorkflowRun, ProcessError> {
        let mut run = WorkflowRun::new(WorkflowKind::CompileProject);
        let files: Vec<Utf8PathBuf> = self.project.model_files().cloned().collect();
        self.compile_into(&mut run, &files).await?;
        Ok(run)
    }

    pub async fn generate_then_build(&mut self, main: &str) -> Result<WorkflowRun, ProcessError> {
        let mut run = WorkflowRun::new(WorkflowKind::GenerateThenBuild);
        self.generate_and_build_into(&mut run, main).await?;
        Ok(run)
    }

    pub async fn generate_then_build_then_debug(
        &mut self,
        main: &str,
    ) -> Result<WorkflowRun, ProcessError> {
        let mut run = WorkflowRun::new(WorkflowKind::GenerateThenBuildThenDebug);
        self.generate_and_build_into(&mut run, main).await?;
        if run.succeeded() {
            self.debug(&mut run, main).await?;
        }
        Ok(run)
    }

    /// Run the debugger on the executable built for `main` and record the
    /// stage in `run`. Returns once the debugger exits.
    pub async fn debug(&mut self, run: &mut WorkflowRun, main: &str) -> Result<(), ProcessError> {
        let exe = self.project.executable_path(main);
        let command = self.project.debugger_command(&exe);
        self.stage(run, Stage::Debug(exe), &command, RunMode::Interactive)
            .await?;
        Ok(())
    }

    async fn generate_and_build_into(
        &mut self,
        run: &mut WorkflowRun,
        main: &str,
    ) -> Result<(), ProcessError> {
        let files: Vec<Utf8PathBuf> = self.project.model_files().cloned().collect();
        self.compile_into(run, &files).await?;
        if run.succeeded() {
            let command = self.project.build_command(main);
            self.stage(run, Stage::Build(main.to_string()), &command, RunMode::Background)
                .await?;
        }
        Ok(())
    }

    async fn compile_into(
        &mut self,
        run: &mut WorkflowRun,
        files: &[Utf8PathBuf],
    ) -> Result<(), ProcessError> {
        let mut status = NOTHING_GENERATED;
        for file in files.iter().filter(|f| is_model_file(f)) {
            let command = self.orchestrator.toolchain().generation_command(
                file,
                &self.project.output_dir(file),
                &self.project.switches(file),
            );
            let command = command.inspect_err(|e| self.console.error(&format!("{e}\n")))?;
            status = self
                .stage(run, Stage::Generate(file.clone()), &command, RunMode::Background)
                .await?;
            if status != SUCCESS {
                break;
            }
        }
        if status == SUCCESS {
            self.project.recompute();
            run.reloaded = true;
        }
        run.status = status;
        Ok(())
    }

    async fn stage(
        &mut self,
        run: &mut WorkflowRun,
        stage: Stage,
        command: &CommandLine,
        mode: RunMode,
    ) -> Result<Status, ProcessError> {
        tracing::info!(workflow = %run.kind, %stage, "stage started");
        let status = self
            .orchestrator
            .run_stage(command, mode, self.console)
            .await?;
        tracing::info!(workflow = %run.kind, %stage, status, "stage finished");
        run.stages.push(StageRecord { stage, status });
        run.status = status;
        Ok(status)
    }
}
