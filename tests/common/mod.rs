#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use qgenlink::project::ProjectFile;
use qgenlink::toolchain::{CommandLine, ProcessError, ProcessOutput, ProcessRunner, RunMode};
use qgenlink::{Orchestrator, Project, Toolchain};
use std::cell::RefCell;
use std::fs;

/// Diagram JSON with a top-level system and one subsystem.
pub const CTRL_DIAGRAMS: &str = r#"{
  "diagrams": [
    {
      "name": "ctrl",
      "items": [
        { "id": "ctrl/Gain1", "x": 10, "y": 20, "children": [ { "text": "Gain1" } ] },
        {
          "id": "ctrl/Sub",
          "data": { "dblclick": "showdiagram(\"ctrl/Sub\")" },
          "children": [ { "children": [ { "text": "in1" } ] } ]
        },
        { "data": { "dblclick": "showdiagram(1)" }, "children": [ { "text": "group" } ] }
      ]
    },
    {
      "name": "ctrl/Sub",
      "items": [
        { "id": "ctrl/Sub/Sum" },
        { "id": "ctrl/Sub/Out1", "children": [ { "text": "Out1" } ] }
      ]
    }
  ]
}"#;

/// Runner answering from a list of rules; every call is recorded.
pub struct ScriptedRunner {
    rules: Vec<(String, Result<ProcessOutput, String>)>,
    pub calls: RefCell<Vec<(CommandLine, RunMode)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Commands whose text contains `needle` exit with `status`.
    pub fn on(mut self, needle: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.push((
            needle.to_string(),
            Ok(ProcessOutput {
                status,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        ));
        self
    }

    /// Commands whose text contains `needle` cannot be started.
    pub fn unstartable(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Err(needle.to_string())));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(c, _)| c.to_string()).collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }
}

impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandLine, mode: RunMode) -> Result<ProcessOutput, ProcessError> {
        self.calls.borrow_mut().push((command.clone(), mode));
        let text = command.to_string();
        for (needle, outcome) in &self.rules {
            if text.contains(needle.as_str()) {
                return match outcome {
                    Ok(out) => Ok(out.clone()),
                    Err(_) => Err(ProcessError::Launch {
                        program: command.program.to_string(),
                        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                    }),
                };
            }
        }
        Ok(ProcessOutput::default())
    }
}

pub fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("utf8 temp path")
}

pub fn write(path: &Utf8Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Project in `root` with sources under `src/`, generated code in `generated/`.
pub fn project_with_models(root: &Utf8Path, models: &[&str]) -> Project {
    for m in models {
        write(&root.join("src").join(m), "Model { }\n");
    }
    let mut config = ProjectFile::default();
    config.project.source_dirs = vec!["src".to_string()];
    config.project.build = vec!["gprbuild".to_string(), "-P".to_string(), "default.gpr".to_string()];
    config.qgen.output_dir = Some("generated".to_string());
    Project::from_config(root, config)
}

pub fn orchestrator(runner: ScriptedRunner) -> Orchestrator<ScriptedRunner> {
    Orchestrator::new(Toolchain::new("/opt/qgen/bin/qgenc"), runner)
}
