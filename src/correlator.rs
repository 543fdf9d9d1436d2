//! Debugger ↔ diagram correlation.
//!
//! A [`DebugSession`] lives as long as a debugger session. It owns the
//! mapping index built when the debugger starts, highlights the blocks
//! behind the current source line, and turns a block into breakpoints.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;

use crate::console::Console;
use crate::mapping::{MappingIndex, SourceLocation};
use crate::model::{BlockId, ItemRef};
use crate::project::Project;
use crate::toolchain::{Orchestrator, ProcessRunner};
use crate::viewer::{DiagramViewer, InteractionContext, ViewerId, ViewerRegistry};

/// Line-oriented command channel of a running debugger.
pub trait DebuggerChannel {
    fn send(&mut self, command: &str);
}

/// Records commands instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct RecordingDebugger {
    pub commands: Vec<String>,
}

impl DebuggerChannel for RecordingDebugger {
    fn send(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}

/// Debugger command setting a breakpoint at `loc`.
pub fn break_command(loc: &SourceLocation) -> String {
    format!("break {}:{}", loc.file, loc.line)
}

/// Outcome of a location change that mapped to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub model: Utf8PathBuf,
    pub viewer: ViewerId,
    pub blocks: BTreeSet<BlockId>,
    /// Items now selected in the viewer, empty if its diagrams could not be loaded.
    pub selected: Vec<ItemRef>,
}

#[derive(Debug, Default)]
pub struct DebugSession {
    mapping: MappingIndex,
}

impl DebugSession {
    /// Start a session: index the mapping file of every model in the project.
    /// Models without a mapping file are skipped.
    pub fn start(project: &Project, console: &dyn Console) -> Self {
        let mut mapping = MappingIndex::new();
        let mut loaded = 0usize;
        for model in project.model_files() {
            if mapping.load(project, model, console) {
                loaded += 1;
            }
        }
        tracing::info!(loaded, "debug session started");
        Self { mapping }
    }

    pub fn with_mapping(mapping: MappingIndex) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &MappingIndex {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut MappingIndex {
        &mut self.mapping
    }

    /// The debugger stopped at `file:line`. Opens (or reuses) the viewer of
    /// the model that generated `file` and selects the blocks behind the line.
    /// Returns `None` when `file` does not come from a model.
    pub async fn location_changed<R: ProcessRunner>(
        &self,
        file: &Utf8Path,
        line: u32,
        viewers: &mut ViewerRegistry,
        orchestrator: &Orchestrator<R>,
        project: &Project,
        console: &dyn Console,
    ) -> Option<Correlation> {
        let model = self.mapping.get_model_file(file)?.to_path_buf();
        let blocks = self.mapping.get_blocks(file, line);
        tracing::debug!(%file, line, %model, blocks = blocks.len(), "location changed");

        let id = viewers.open_model(&model, orchestrator, project, console).await;
        let viewer = viewers.get_mut(id)?;
        if !viewer.is_ready() {
            tracing::warn!("cannot highlight blocks for {file}:{line}, diagrams of {model} unavailable");
            return Some(Correlation {
                model,
                viewer: id,
                blocks,
                selected: Vec::new(),
            });
        }
        let selected = viewer.select_blocks(&blocks);
        Some(Correlation {
            model,
            viewer: id,
            blocks,
            selected,
        })
    }

    /// Set breakpoints on every line generated by the block under the
    /// right-clicked item. Returns the locations sent to the debugger.
    pub fn break_on_block(
        &self,
        viewer: &DiagramViewer,
        context: &InteractionContext,
        debugger: &mut dyn DebuggerChannel,
        console: &dyn Console,
    ) -> Vec<SourceLocation> {
        let Some(block) = viewer.owning_block(&context.item) else {
            tracing::debug!(item = ?context.item, "no block above clicked item");
            return Vec::new();
        };
        let locations = self.mapping.get_breakpoints(block.as_str());
        if locations.is_empty() {
            console.text(&format!("No breakpoint for '{block}'\n"));
            return Vec::new();
        }
        for loc in &locations {
            debugger.send(&break_command(loc));
        }
        locations.into_iter().collect()
    }
}

/// Contextual menu label for breaking on the block under `context`.
pub fn break_on_block_label(viewer: Option<&DiagramViewer>, context: Option<&InteractionContext>) -> String {
    let block = match (viewer, context) {
        (Some(v), Some(c)) => v.owning_block(&c.item),
        _ => None,
    };
    match block {
        Some(id) => format!("Debug/Break on block {}", id.escaped()),
        None => "Debug/Break on block".to_string(),
    }
}
