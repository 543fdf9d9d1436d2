//! Executable resolution – locate tool binaries on disk.

use camino::{Utf8Path, Utf8PathBuf};

/// Resolver that searches for an executable in an ordered list of
/// directories (first match wins).
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    search_paths: Vec<Utf8PathBuf>,
}

impl ExecutableResolver {
    /// Create a resolver that will search the provided directories in order.
    pub fn new<P: AsRef<Utf8Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            search_paths: paths
                .into_iter()
                .map(|p| p.as_ref().to_path_buf())
                .collect(),
        }
    }

    /// Resolver over the directories of the `PATH` environment variable.
    /// Entries that are not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        let paths = std::env::var_os("PATH")
            .map(|p| {
                std::env::split_paths(&p)
                    .filter_map(|d| Utf8PathBuf::from_path_buf(d).ok())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self {
            search_paths: paths,
        }
    }

    pub fn search_paths(&self) -> &[Utf8PathBuf] {
        &self.search_paths
    }

    /// Locate `name` (e.g. `qgenc`), also trying `name.exe` on Windows.
    pub fn locate(&self, name: &str) -> Option<Utf8PathBuf> {
        let mut candidates = vec![name.to_string()];
        if cfg!(windows) && !name.ends_with(".exe") {
            candidates.push(format!("{name}.exe"));
        }
        for dir in &self.search_paths {
            for file_name in &candidates {
                let candidate = dir.join(file_name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Lexically resolve `.` and `..` components.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    use camino::Utf8Component;
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let last_is_normal = matches!(
                    out.components().next_back(),
                    Some(Utf8Component::Normal(_))
                );
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}
