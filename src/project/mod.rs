//! Project model: where sources live, where generated code goes, and which
//! switches each model file is compiled with.
//!
//! - [`config`] – `qgen.toml` parsing and validation

pub mod config;

pub use config::{ConfigError, PROJECT_FILE, ProjectFile, load_config, load_config_from_str};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::toolchain::CommandLine;

/// Switch-map key holding the project-wide default switches.
pub const LANGUAGE_KEY: &str = "simulink";

/// Whether `path` is a Simulink model file (`.mdl`).
pub fn is_model_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("mdl"))
}

/// Whether `path` is a pre-converted diagram (`.mdl.json`).
pub fn is_diagram_json(path: &Utf8Path) -> bool {
    path.as_str().to_ascii_lowercase().ends_with(".mdl.json")
}

/// A loaded project and the sources found in it.
#[derive(Debug, Clone)]
pub struct Project {
    root: Utf8PathBuf,
    config_path: Option<Utf8PathBuf>,
    config: ProjectFile,
    sources: Vec<Utf8PathBuf>,
    generation: u64,
}

impl Project {
    /// Load `qgen.toml` at `path`; the project root is its directory.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = load_config(path.as_std_path())
            .with_context(|| format!("Failed to load project {}", path))?;
        let root = match path.parent() {
            Some(p) if !p.as_str().is_empty() => p.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        let root = root.canonicalize_utf8().unwrap_or(root);
        let mut project = Self::from_config(root, config);
        project.config_path = Some(path.to_path_buf());
        Ok(project)
    }

    /// Build a project rooted at `root` from an in-memory configuration.
    pub fn from_config(root: impl Into<Utf8PathBuf>, config: ProjectFile) -> Self {
        let mut project = Self {
            root: root.into(),
            config_path: None,
            config,
            sources: Vec::new(),
            generation: 0,
        };
        project.sources = project.scan_sources();
        project
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectFile {
        &self.config
    }

    /// All source files found in the source dirs, sorted per directory.
    pub fn sources(&self) -> &[Utf8PathBuf] {
        &self.sources
    }

    pub fn model_files(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.sources.iter().filter(|p| is_model_file(p))
    }

    /// Number of times the project metadata was recomputed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reload the project file (when there is one) and rescan the source
    /// dirs, so that freshly generated files become visible.
    pub fn recompute(&mut self) {
        if let Some(path) = &self.config_path {
            match load_config(path.as_std_path()) {
                Ok(config) => self.config = config,
                Err(e) => tracing::warn!("keeping previous configuration, {path}: {e}"),
            }
        }
        self.sources = self.scan_sources();
        self.generation += 1;
        tracing::info!(
            sources = self.sources.len(),
            generation = self.generation,
            "project recomputed"
        );
    }

    fn resolve(&self, relative: &str) -> Utf8PathBuf {
        let p = Utf8Path::new(relative);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    fn scan_sources(&self) -> Vec<Utf8PathBuf> {
        let mut out = Vec::new();
        for dir in &self.config.project.source_dirs {
            let dir = self.resolve(dir);
            if !dir.is_dir() {
                tracing::debug!("source dir {dir} does not exist");
                continue;
            }
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!("while scanning {dir}: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                match Utf8PathBuf::from_path_buf(entry.into_path()) {
                    Ok(p) if !out.contains(&p) => out.push(p),
                    Ok(_) => {}
                    Err(p) => tracing::warn!("skipping non-UTF8 path {}", p.display()),
                }
            }
        }
        out
    }

    pub fn object_dir(&self) -> Utf8PathBuf {
        self.resolve(&self.config.project.object_dir)
    }

    /// Output directory for code generated from `model`.
    pub fn output_dir(&self, _model: &Utf8Path) -> Utf8PathBuf {
        match self.config.qgen.output_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => self.resolve(dir),
            _ => self.object_dir(),
        }
    }

    /// Raw switch string for `model`: the per-file entry, else the
    /// project-wide default, else nothing.
    pub fn raw_switches(&self, model: &Utf8Path) -> &str {
        let switches = &self.config.qgen.switches;
        model
            .file_name()
            .and_then(|name| switches.get(name))
            .filter(|s| !s.trim().is_empty())
            .or_else(|| switches.get(LANGUAGE_KEY))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Switches for `model`, split shell-style.
    pub fn switches(&self, model: &Utf8Path) -> Vec<String> {
        let raw = self.raw_switches(model);
        shlex::split(raw).unwrap_or_else(|| {
            tracing::warn!("ignoring malformed switches for {model}: {raw}");
            Vec::new()
        })
    }

    /// Location of the block/line mapping written by the generator for `model`.
    pub fn mapping_artifact(&self, model: &Utf8Path) -> Utf8PathBuf {
        let name = model.file_name().unwrap_or(model.as_str());
        self.output_dir(model).join(format!("{name}.json"))
    }

    /// Path of the executable linked for `main` (`main.adb` -> `obj/main`).
    pub fn executable_path(&self, main: &str) -> Utf8PathBuf {
        let main = Utf8Path::new(main);
        let stem = main.file_stem().unwrap_or(main.as_str());
        let exe = if cfg!(windows) {
            format!("{stem}.exe")
        } else {
            stem.to_string()
        };
        self.object_dir().join(exe)
    }

    pub fn build_command(&self, main: &str) -> CommandLine {
        let mut words = self.config.project.build.iter();
        let program = words.next().map(String::as_str).unwrap_or("gprbuild");
        CommandLine::new(program).args(words.cloned()).arg(main)
    }

    pub fn debugger_command(&self, executable: &Utf8Path) -> CommandLine {
        CommandLine::new(self.config.project.debugger.as_str()).arg(executable.as_str())
    }
}
