//! QGen toolchain: locating `qgenc`/`mdl2json` and running them.
//!
//! - [`process`] – process execution abstraction (tokio vs. scripted runners)
//! - [`resolver`] – executable lookup on `PATH`

pub mod process;
pub mod resolver;

pub use process::*;
pub use resolver::{ExecutableResolver, normalize};

use camino::{Utf8Path, Utf8PathBuf};

use crate::console::Console;
use crate::project::Project;

/// Name of the code generator executable.
pub const GENERATOR: &str = "qgenc";

/// Only meaningful to code generation; stripped from conversion switches.
pub const FLATTENING_SWITCH: &str = "--full-flattening";

/// Arguments the generator always receives before the per-file ones.
const GENERATOR_PREFIX: &[&str] = &["--trace"];

/// Location of the generator and of the diagram converter shipped with it.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    generator: Option<Utf8PathBuf>,
    converter: Option<Utf8PathBuf>,
}

impl Toolchain {
    /// Toolchain rooted at an explicit generator path.
    pub fn new(generator: impl Into<Utf8PathBuf>) -> Self {
        let generator = generator.into();
        let converter = Some(Self::converter_for(&generator));
        Self {
            generator: Some(generator),
            converter,
        }
    }

    /// Toolchain with neither executable; every command refuses to run.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Use the project's configured generator, else search `PATH`.
    pub fn discover(project: &Project) -> Self {
        Self::discover_with(project, &ExecutableResolver::from_env())
    }

    /// Like [`Toolchain::discover`] with an explicit search path. A configured
    /// generator with a directory part is taken relative to the project root;
    /// a bare program name is looked up like the default one.
    pub fn discover_with(project: &Project, resolver: &ExecutableResolver) -> Self {
        let configured = project.config().qgen.generator.as_deref().map(Utf8Path::new);
        let name = match configured {
            Some(path) if path.components().count() > 1 || path.is_absolute() => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    project.root().join(path)
                };
                return Self::new(normalize(&path));
            }
            Some(path) => path.as_str(),
            None => GENERATOR,
        };
        match resolver.locate(name) {
            Some(path) => {
                tracing::debug!("found {name} at {path}");
                Self::new(path)
            }
            None => {
                tracing::info!("{name} not found on PATH, code generation disabled");
                Self::unavailable()
            }
        }
    }

    /// `mdl2json` lives in `<prefix>/libexec/qgen/bin` next to `<prefix>/bin/qgenc`.
    pub fn converter_for(generator: &Utf8Path) -> Utf8PathBuf {
        let dir = generator.parent().unwrap_or(Utf8Path::new("."));
        normalize(&dir.join("../libexec/qgen/bin/mdl2json"))
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    pub fn generator(&self) -> Option<&Utf8Path> {
        self.generator.as_deref()
    }

    pub fn converter(&self) -> Option<&Utf8Path> {
        self.converter.as_deref()
    }

    /// `mdl2json <model> <switches without --full-flattening>`.
    pub fn conversion_command(
        &self,
        model: &Utf8Path,
        switches: &[String],
    ) -> Result<CommandLine, ProcessError> {
        let converter = self.converter.as_ref().ok_or_else(|| ProcessError::NotFound {
            program: "mdl2json".to_string(),
        })?;
        Ok(CommandLine::new(converter.clone())
            .arg(model.as_str())
            .args(switches.iter().filter(|s| *s != FLATTENING_SWITCH).cloned()))
    }

    /// Full generator invocation for one model file.
    ///
    /// Defaults (`-i`, `-l ada`, `-t <base>_types.txt`) are dropped whenever the
    /// configured switches already provide the same option; `-c` takes the
    /// place of `-i`.
    pub fn generation_command(
        &self,
        model: &Utf8Path,
        output_dir: &Utf8Path,
        switches: &[String],
    ) -> Result<CommandLine, ProcessError> {
        let generator = self.generator.as_ref().ok_or_else(|| ProcessError::NotFound {
            program: GENERATOR.to_string(),
        })?;
        let has = |flag: &str| switches.iter().any(|s| s == flag);
        let base = model.file_stem().unwrap_or(model.as_str());

        let mut cmd = CommandLine::new(generator.clone()).args(GENERATOR_PREFIX.iter().copied());
        if !has("-i") && !has("-c") {
            cmd = cmd.arg("-i");
        }
        if !has("-l") {
            cmd = cmd.args(["-l", "ada"]);
        }
        cmd = cmd.args(["-o", output_dir.as_str()]);
        if !has("-t") {
            cmd = cmd.arg("-t").arg(format!("{base}_types.txt"));
        }
        Ok(cmd.args(switches.iter().cloned()).arg(model.as_str()))
    }
}

/// Runs toolchain and build commands on behalf of the rest of the crate and
/// reports their failures to the user.
pub struct Orchestrator<R> {
    toolchain: Toolchain,
    runner: R,
}

impl<R: ProcessRunner> Orchestrator<R> {
    pub fn new(toolchain: Toolchain, runner: R) -> Self {
        Self { toolchain, runner }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Convert `model` to diagram JSON. Resolves with the converter's
    /// standard output; a non-zero exit is shown on the console and rejects.
    /// Never retried.
    pub async fn convert_to_diagram_json(
        &self,
        project: &Project,
        model: &Utf8Path,
        console: &dyn Console,
    ) -> Result<String, ProcessError> {
        let command = self
            .toolchain
            .conversion_command(model, &project.switches(model))
            .inspect_err(|e| console.error(&format!("When running mdl2json: {e}\n")))?;
        let output = self.launch(&command, RunMode::Foreground, console).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            console.error(&format!("When running mdl2json: {}\n", output.diagnostics()));
            Err(ProcessError::Failed {
                program: command.program_name().to_string(),
                status: output.status,
                output: output.diagnostics().to_string(),
            })
        }
    }

    /// Run one workflow stage and return its exit status. Non-zero statuses
    /// are shown on the console but are not errors.
    pub async fn run_stage(
        &self,
        command: &CommandLine,
        mode: RunMode,
        console: &dyn Console,
    ) -> Result<i32, ProcessError> {
        console.text(&format!("{command}\n"));
        let output = self.launch(command, mode, console).await?;
        if !output.success() {
            console.error(&format!(
                "{} exited with status {}\n{}",
                command.program_name(),
                output.status,
                output.diagnostics()
            ));
        }
        Ok(output.status)
    }

    async fn launch(
        &self,
        command: &CommandLine,
        mode: RunMode,
        console: &dyn Console,
    ) -> Result<ProcessOutput, ProcessError> {
        self.runner
            .run(command, mode)
            .await
            .inspect_err(|e| console.error(&format!("{e}\n")))
    }
}
