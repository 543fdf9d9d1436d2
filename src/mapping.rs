//! Block ↔ source line mapping written by the code generator.
//!
//! For every model file the generator writes `<output_dir>/<model>.json`:
//!
//! ```json
//! { "ctrl.adb": {                       // one entry per generated file
//!       "ctrl/Gain1": {                 // one entry per block
//!           "lines": [12, 13],          // lines impacted by the block
//!           "symbol": ["gain1_out"]     // variables from the block
//!       } } }
//! ```
//!
//! [`MappingIndex`] accumulates these files and answers queries in both
//! directions.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::console::Console;
use crate::model::BlockId;
use crate::project::Project;
use crate::toolchain::normalize;

/// A line of a generated source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Utf8PathBuf,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Utf8PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// What the generator recorded for one block in one file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BlockEntry {
    #[serde(default, alias = "line")]
    pub lines: Vec<u32>,
    #[serde(default)]
    pub symbol: Vec<String>,
}

/// Parsed mapping file: generated file name → block id → entry.
pub type MappingArtifact = IndexMap<String, IndexMap<String, BlockEntry>>;

/// Bidirectional index between blocks and generated source lines.
///
/// `lines` is kept as the exact inverse of `blocks`; loading only ever adds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingIndex {
    blocks: BTreeMap<BlockId, BTreeSet<SourceLocation>>,
    lines: BTreeMap<SourceLocation, BTreeSet<BlockId>>,
    files: BTreeMap<Utf8PathBuf, Utf8PathBuf>,
    symbols: BTreeMap<BlockId, BTreeSet<String>>,
}

impl MappingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the mapping file the generator wrote for `model`. A missing or
    /// malformed file is reported on the console and leaves the index as it
    /// was. Returns whether anything was loaded.
    pub fn load(&mut self, project: &Project, model: &Utf8Path, console: &dyn Console) -> bool {
        let artifact = project.mapping_artifact(model);
        let base_dir = project.output_dir(model);
        self.load_file(&artifact, &base_dir, model, console)
    }

    /// Like [`MappingIndex::load`] with explicit locations. Relative source
    /// file names in the artifact are resolved against `base_dir`.
    pub fn load_file(
        &mut self,
        artifact: &Utf8Path,
        base_dir: &Utf8Path,
        model: &Utf8Path,
        console: &dyn Console,
    ) -> bool {
        let text = match std::fs::read_to_string(artifact) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!("cannot read {artifact}: {e}");
                console.text(&format!("Mapping file {artifact} not found\n"));
                return false;
            }
        };
        let parsed: MappingArtifact = match serde_json::from_str(&text) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("invalid mapping file {artifact}: {e}");
                console.error(&format!("Invalid json in {artifact}\n"));
                return false;
            }
        };
        self.merge(model, &parsed, base_dir);
        tracing::debug!(
            %model,
            blocks = self.blocks.len(),
            lines = self.lines.len(),
            "mapping loaded"
        );
        true
    }

    /// Union `artifact` (generated from `model`) into the index.
    pub fn merge(&mut self, model: &Utf8Path, artifact: &MappingArtifact, base_dir: &Utf8Path) {
        for (file_name, blocks) in artifact {
            let file = resolve_source(file_name, base_dir);
            self.files.insert(file.clone(), model.to_path_buf());

            for (block, entry) in blocks {
                let block = BlockId::from(block.as_str());
                for line in &entry.lines {
                    let loc = SourceLocation::new(file.clone(), *line);
                    self.blocks.entry(block.clone()).or_default().insert(loc.clone());
                    self.lines.entry(loc).or_default().insert(block.clone());
                }
                if !entry.symbol.is_empty() {
                    self.symbols
                        .entry(block)
                        .or_default()
                        .extend(entry.symbol.iter().cloned());
                }
            }
        }
    }

    /// Locations to put breakpoints on for `block`; empty if unknown.
    pub fn get_breakpoints(&self, block: &str) -> BTreeSet<SourceLocation> {
        self.blocks.get(block).cloned().unwrap_or_default()
    }

    /// Blocks that generated exactly this line; empty if unknown.
    pub fn get_blocks(&self, file: &Utf8Path, line: u32) -> BTreeSet<BlockId> {
        let key = SourceLocation::new(normalize(file), line);
        self.lines.get(&key).cloned().unwrap_or_default()
    }

    /// Model file `file` was generated from.
    pub fn get_model_file(&self, file: &Utf8Path) -> Option<&Utf8Path> {
        self.files.get(&normalize(file)).map(Utf8PathBuf::as_path)
    }

    /// Symbols the generator attributed to `block`.
    pub fn get_symbols(&self, block: &str) -> BTreeSet<String> {
        self.symbols.get(block).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.files.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&BlockId, &BTreeSet<SourceLocation>)> {
        self.blocks.iter()
    }

    pub fn lines(&self) -> impl Iterator<Item = (&SourceLocation, &BTreeSet<BlockId>)> {
        self.lines.iter()
    }

    pub fn source_files(&self) -> impl Iterator<Item = (&Utf8PathBuf, &Utf8PathBuf)> {
        self.files.iter()
    }
}

/// Index keys are lexically normalized so that `gen/../gen/a.adb` and
/// `gen/a.adb` name the same file.
fn resolve_source(name: &str, base_dir: &Utf8Path) -> Utf8PathBuf {
    let p = Utf8Path::new(name);
    if p.is_absolute() {
        normalize(p)
    } else {
        normalize(&base_dir.join(p))
    }
}
