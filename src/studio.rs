//! Session controller: owns the project, the toolchain, the open viewers and
//! the current debug session, and reacts to IDE events.

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::rc::Rc;

use crate::console::Console;
use crate::correlator::{Correlation, DebugSession, DebuggerChannel, break_on_block_label};
use crate::mapping::SourceLocation;
use crate::project::{Project, is_diagram_json, is_model_file};
use crate::toolchain::{Orchestrator, ProcessError, ProcessRunner};
use crate::viewer::{DesktopEntry, InteractionContext, ViewerId, ViewerRegistry};
use crate::workflow::{WorkflowKind, WorkflowRun, Workflows};

pub struct Studio<R> {
    project: Project,
    orchestrator: Orchestrator<R>,
    viewers: ViewerRegistry,
    session: Option<DebugSession>,
    console: Rc<dyn Console>,
}

impl<R: ProcessRunner> Studio<R> {
    pub fn new(project: Project, orchestrator: Orchestrator<R>, console: Rc<dyn Console>) -> Self {
        Self {
            project,
            orchestrator,
            viewers: ViewerRegistry::new(),
            session: None,
            console,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn orchestrator(&self) -> &Orchestrator<R> {
        &self.orchestrator
    }

    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    pub fn viewers_mut(&mut self) -> &mut ViewerRegistry {
        &mut self.viewers
    }

    pub fn session(&self) -> Option<&DebugSession> {
        self.session.as_ref()
    }

    // ── Viewers ────────────────────────────────────────────────────────────

    /// Open `file` in a diagram viewer if it is a model or converted diagram.
    /// Returns `None` for any other file, which the IDE opens as text.
    pub async fn open_file(&mut self, file: &Utf8Path) -> Result<Option<ViewerId>> {
        if is_diagram_json(file) {
            tracing::info!("Open {file}");
            if let Some(id) = self.viewers.find(file) {
                self.viewers.get_or_create(file);
                return Ok(Some(id));
            }
            let data = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file))?;
            return Ok(Some(self.viewers.open_json(file, &data, &*self.console)));
        }
        if is_model_file(file) {
            tracing::info!("Open {file}");
            let id = self
                .viewers
                .open_model(file, &self.orchestrator, &self.project, &*self.console)
                .await;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Serialized desktop state of a viewer.
    pub fn save_desktop(&self, id: ViewerId) -> Option<String> {
        let entry = self.viewers.get(id)?.desktop_entry();
        serde_json::to_string(&entry).ok()
    }

    /// Reopen a viewer saved by [`Studio::save_desktop`].
    pub async fn load_desktop(&mut self, data: &str) -> Result<ViewerId> {
        let entry: DesktopEntry =
            serde_json::from_str(data).context("Invalid desktop entry")?;
        let Some(id) = self.open_file(&entry.file).await? else {
            bail!("{} is not a diagram file", entry.file);
        };
        if let Some(v) = self.viewers.get_mut(id) {
            v.view.scale = entry.scale;
            v.view.topleft = entry.topleft;
        }
        Ok(id)
    }

    // ── Code generation ────────────────────────────────────────────────────

    fn workflows(&mut self) -> Workflows<'_, R> {
        Workflows::new(&self.orchestrator, &mut self.project, &*self.console)
    }

    fn refuse_without_toolchain(&self) -> Result<(), ProcessError> {
        if self.orchestrator.toolchain().is_available() {
            return Ok(());
        }
        let e = ProcessError::NotFound {
            program: crate::toolchain::GENERATOR.to_string(),
        };
        self.console.error(&format!("{e}\n"));
        Err(e)
    }

    /// Generate code for one model file (the contextual file).
    pub async fn generate_for_file(&mut self, file: &Utf8Path) -> Result<WorkflowRun, ProcessError> {
        self.refuse_without_toolchain()?;
        self.workflows().compile(&[file.to_path_buf()]).await
    }

    /// Generate code for `files` in order, stopping at the first failure.
    pub async fn generate_for_files(
        &mut self,
        files: &[Utf8PathBuf],
    ) -> Result<WorkflowRun, ProcessError> {
        self.refuse_without_toolchain()?;
        self.workflows().compile(files).await
    }

    /// Generate code for every model file of the project.
    pub async fn generate_for_project(&mut self) -> Result<WorkflowRun, ProcessError> {
        self.refuse_without_toolchain()?;
        self.workflows().compile_project().await
    }

    /// Run a workflow by kind. `target` is the model file for the compile
    /// kinds, the main unit for the build workflows, and unused for
    /// [`WorkflowKind::CompileProject`].
    ///
    /// The debug workflow holds a [`DebugSession`] for as long as the
    /// debugger runs, like a debugger started from the IDE.
    pub async fn run_workflow(
        &mut self,
        kind: WorkflowKind,
        target: &str,
    ) -> Result<WorkflowRun, ProcessError> {
        self.refuse_without_toolchain()?;
        let mut workflows = self.workflows();
        match kind {
            WorkflowKind::CompileFile | WorkflowKind::CompileFiles => {
                workflows.compile(&[Utf8PathBuf::from(target)]).await
            }
            WorkflowKind::CompileProject => workflows.compile_project().await,
            WorkflowKind::GenerateThenBuild => workflows.generate_then_build(target).await,
            WorkflowKind::GenerateThenBuildThenDebug => {
                let mut run = workflows.generate_then_build(target).await?;
                run.kind = kind;
                if !run.succeeded() {
                    return Ok(run);
                }
                self.debugger_started();
                let debugged = self.workflows().debug(&mut run, target).await;
                self.debugger_terminated();
                debugged.map(|()| run)
            }
        }
    }

    // ── Debugger events ────────────────────────────────────────────────────

    pub fn debugger_started(&mut self) {
        self.session = Some(DebugSession::start(&self.project, &*self.console));
    }

    pub fn debugger_terminated(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("debug session ended");
        }
    }

    pub async fn debugger_location_changed(
        &mut self,
        file: &Utf8Path,
        line: u32,
    ) -> Option<Correlation> {
        let session = self.session.as_ref()?;
        session
            .location_changed(
                file,
                line,
                &mut self.viewers,
                &self.orchestrator,
                &self.project,
                &*self.console,
            )
            .await
    }

    /// Whether `context` is a right-click on a model diagram while a
    /// debugger runs.
    pub fn is_model_block_and_debugger(&self, context: Option<&InteractionContext>) -> bool {
        self.session.is_some() && context.is_some_and(|c| is_model_file(&c.file))
    }

    pub fn break_on_block_label(&self, context: Option<&InteractionContext>) -> String {
        if self.session.is_none() {
            return break_on_block_label(None, None);
        }
        let viewer = context.and_then(|c| self.viewers.by_file(&c.file));
        break_on_block_label(viewer, context)
    }

    /// Set breakpoints for the block under `context`.
    pub fn break_on_block(
        &self,
        context: &InteractionContext,
        debugger: &mut dyn DebuggerChannel,
    ) -> Vec<SourceLocation> {
        let (Some(session), Some(viewer)) = (self.session.as_ref(), self.viewers.by_file(&context.file))
        else {
            return Vec::new();
        };
        session.break_on_block(viewer, context, debugger, &*self.console)
    }
}
