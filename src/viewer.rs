//! Diagram viewers: one per open model file.
//!
//! A viewer starts empty, asks the converter for the model's diagram JSON
//! and becomes ready once it is parsed. Viewers opened on pre-converted JSON
//! are ready immediately.

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::action::{DiagramRef, UiAction, parse_action};
use crate::console::Console;
use crate::model::{BlockId, Diagram, DiagramCollection, ItemRef};
use crate::project::Project;
use crate::toolchain::{Orchestrator, ProcessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    /// No diagram data yet (just created, or the last load failed).
    Uninitialized,
    /// Conversion in flight.
    Loading,
    /// Diagrams available, one of them current.
    Ready,
}

/// Zoom and scroll position, persisted with the desktop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub scale: f64,
    pub topleft: [f64; 2],
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            topleft: [0.0, 0.0],
        }
    }
}

/// Persisted form of a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopEntry {
    pub file: Utf8PathBuf,
    pub scale: f64,
    pub topleft: [f64; 2],
}

/// What a right-click captured, for contextual actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionContext {
    pub file: Utf8PathBuf,
    pub item: ItemRef,
    pub top_item: ItemRef,
}

/// Identity of a viewer, unique for the lifetime of its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewerId(u64);

#[derive(Debug)]
pub struct DiagramViewer {
    id: ViewerId,
    file: Utf8PathBuf,
    state: ViewerState,
    diagrams: Option<DiagramCollection>,
    current: Option<usize>,
    selection: BTreeSet<ItemRef>,
    pub view: ViewState,
}

impl DiagramViewer {
    fn new(id: ViewerId, file: Utf8PathBuf) -> Self {
        Self {
            id,
            file,
            state: ViewerState::Uninitialized,
            diagrams: None,
            current: None,
            selection: BTreeSet::new(),
            view: ViewState::default(),
        }
    }

    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    pub fn title(&self) -> &str {
        self.file.file_name().unwrap_or(self.file.as_str())
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ViewerState::Ready
    }

    pub fn diagrams(&self) -> Option<&DiagramCollection> {
        self.diagrams.as_ref()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_diagram(&self) -> Option<&Diagram> {
        self.diagrams.as_ref()?.diagram(self.current?)
    }

    pub fn selection(&self) -> &BTreeSet<ItemRef> {
        &self.selection
    }

    pub(crate) fn begin_loading(&mut self) {
        self.state = ViewerState::Loading;
    }

    pub(crate) fn loading_failed(&mut self) {
        self.state = ViewerState::Uninitialized;
    }

    /// Parse diagram JSON and make the default diagram current. Actions that
    /// fail to parse are reported once each and dropped from their items.
    pub fn load_json(&mut self, json: &str, console: &dyn Console) -> Result<()> {
        let (diagrams, rejected) = match DiagramCollection::from_json(json) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.state = ViewerState::Uninitialized;
                console.error(&format!("Invalid diagram data for {}: {e}\n", self.file));
                return Err(e.context(format!("Failed to parse diagrams of {}", self.file)));
            }
        };
        for r in &rejected {
            console.error(&format!("{} (in diagram {})\n", r.error, r.diagram));
        }
        self.current = diagrams.default_index();
        self.diagrams = Some(diagrams);
        self.selection.clear();
        self.state = ViewerState::Ready;
        tracing::debug!(file = %self.file, current = ?self.current, "diagrams loaded");
        Ok(())
    }

    /// Make another diagram current. Returns whether it was found.
    pub fn show_diagram(&mut self, target: &DiagramRef) -> bool {
        match self.diagrams.as_ref().and_then(|d| d.resolve(target)) {
            Some(idx) => {
                self.current = Some(idx);
                true
            }
            None => false,
        }
    }

    pub fn perform(&mut self, action: &UiAction, console: &dyn Console) -> bool {
        match action {
            UiAction::ShowDiagram(target) => {
                let found = self.show_diagram(target);
                if !found {
                    console.error(&format!("No diagram {target} in {}\n", self.title()));
                }
                found
            }
        }
    }

    /// Parse and run a textual command such as `showdiagram("Sub")`. A
    /// malformed command produces one diagnostic and changes nothing.
    pub fn execute_command(&mut self, command: &str, console: &dyn Console) -> bool {
        match parse_action(command) {
            Ok(action) => self.perform(&action, console),
            Err(e) => {
                console.error(&format!("{e}\n"));
                false
            }
        }
    }

    /// Run the double-click action of the top-level item containing `item`.
    pub fn double_click(&mut self, item: &ItemRef, console: &dyn Console) -> bool {
        let action = self
            .diagrams
            .as_ref()
            .and_then(|d| d.item(&item.top_level()))
            .and_then(|i| i.on_double_click.clone());
        match action {
            Some(action) => self.perform(&action, console),
            None => false,
        }
    }

    /// Capture the clicked item and its top-level container.
    pub fn right_click(&self, item: &ItemRef) -> Option<InteractionContext> {
        self.diagrams.as_ref()?.item(item)?;
        Some(InteractionContext {
            file: self.file.clone(),
            item: item.clone(),
            top_item: item.top_level(),
        })
    }

    /// Nearest block id at or above `item`.
    pub fn owning_block(&self, item: &ItemRef) -> Option<&BlockId> {
        self.diagrams.as_ref()?.owning_block(item)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select(&mut self, item: ItemRef) {
        self.selection.insert(item);
    }

    /// Replace the selection with the items rendering `blocks`, and show the
    /// diagram holding the first one found. Returns the selected items.
    pub fn select_blocks<'a>(&mut self, blocks: impl IntoIterator<Item = &'a BlockId>) -> Vec<ItemRef> {
        self.selection.clear();
        let Some(diagrams) = self.diagrams.as_ref() else {
            return Vec::new();
        };
        let found: Vec<ItemRef> = blocks
            .into_iter()
            .filter_map(|b| diagrams.find_block(b.as_str()))
            .collect();
        if let Some(first) = found.first() {
            self.current = Some(first.diagram);
        }
        self.selection.extend(found.iter().cloned());
        found
    }

    pub fn desktop_entry(&self) -> DesktopEntry {
        DesktopEntry {
            file: self.file.clone(),
            scale: self.view.scale,
            topleft: self.view.topleft,
        }
    }
}

/// Result of [`ViewerRegistry::get_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opened {
    pub id: ViewerId,
    pub newly_created: bool,
}

/// All open viewers, at most one per file.
#[derive(Debug, Default)]
pub struct ViewerRegistry {
    viewers: IndexMap<Utf8PathBuf, DiagramViewer>,
    focused: Option<ViewerId>,
    next_id: u64,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    pub fn focused(&self) -> Option<ViewerId> {
        self.focused
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagramViewer> {
        self.viewers.values()
    }

    pub fn find(&self, file: &Utf8Path) -> Option<ViewerId> {
        self.viewers.get(file).map(DiagramViewer::id)
    }

    pub fn get(&self, id: ViewerId) -> Option<&DiagramViewer> {
        self.viewers.values().find(|v| v.id == id)
    }

    pub fn get_mut(&mut self, id: ViewerId) -> Option<&mut DiagramViewer> {
        self.viewers.values_mut().find(|v| v.id == id)
    }

    pub fn by_file(&self, file: &Utf8Path) -> Option<&DiagramViewer> {
        self.viewers.get(file)
    }

    pub fn by_file_mut(&mut self, file: &Utf8Path) -> Option<&mut DiagramViewer> {
        self.viewers.get_mut(file)
    }

    /// Existing viewer for `file`, focused, or a new empty one.
    pub fn get_or_create(&mut self, file: &Utf8Path) -> Opened {
        if let Some(v) = self.viewers.get(file) {
            self.focused = Some(v.id);
            return Opened {
                id: v.id,
                newly_created: false,
            };
        }
        let id = ViewerId(self.next_id);
        self.next_id += 1;
        self.viewers
            .insert(file.to_path_buf(), DiagramViewer::new(id, file.to_path_buf()));
        self.focused = Some(id);
        tracing::debug!(%file, ?id, "viewer created");
        Opened {
            id,
            newly_created: true,
        }
    }

    /// Viewer for a model file, converting it if it holds no diagrams yet.
    /// When this returns the viewer is either ready or, if the conversion
    /// failed, back to uninitialized; a later call retries.
    pub async fn open_model<R: ProcessRunner>(
        &mut self,
        file: &Utf8Path,
        orchestrator: &Orchestrator<R>,
        project: &Project,
        console: &dyn Console,
    ) -> ViewerId {
        let opened = self.get_or_create(file);
        let needs_load = self
            .get(opened.id)
            .is_some_and(|v| v.state == ViewerState::Uninitialized);
        if !needs_load {
            return opened.id;
        }
        if let Some(v) = self.get_mut(opened.id) {
            v.begin_loading();
        }
        let result = orchestrator
            .convert_to_diagram_json(project, file, console)
            .await;
        let Some(viewer) = self.get_mut(opened.id) else {
            return opened.id;
        };
        match result {
            Ok(json) => {
                if let Err(e) = viewer.load_json(&json, console) {
                    tracing::warn!("{e:#}");
                }
            }
            Err(e) => {
                viewer.loading_failed();
                tracing::warn!("diagram for {file} not loaded: {e}");
            }
        }
        opened.id
    }

    /// Viewer for already converted JSON; no process involved. An existing
    /// viewer for `file` is returned untouched.
    pub fn open_json(&mut self, file: &Utf8Path, data: &str, console: &dyn Console) -> ViewerId {
        let opened = self.get_or_create(file);
        if opened.newly_created {
            if let Some(v) = self.get_mut(opened.id) {
                if let Err(e) = v.load_json(data, console) {
                    tracing::warn!("{e:#}");
                }
            }
        }
        opened.id
    }

    /// Forget the viewer, as when its window is closed.
    pub fn close(&mut self, id: ViewerId) -> Option<DiagramViewer> {
        let key = self.viewers.iter().find(|(_, v)| v.id == id)?.0.clone();
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.viewers.shift_remove(&key)
    }
}
