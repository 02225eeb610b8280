//! Locating declared shared-library dependencies on disk.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How dependency names are turned into graph nodes.
///
/// `LiveFilesystem` looks names up on the library search paths of the host
/// running the scan, so the resulting component count depends on what is
/// installed there. `DeclaredOnly` never touches the filesystem: every
/// dependency that is not itself an input is kept as an unresolved edge,
/// which makes the output identical across hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    #[default]
    LiveFilesystem,
    DeclaredOnly,
}

impl std::str::FromStr for ResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live-filesystem" | "live" => Ok(Self::LiveFilesystem),
            "declared-only" | "declared" => Ok(Self::DeclaredOnly),
            other => Err(format!("unknown resolution mode: {other}")),
        }
    }
}

const LOADER_PREFIXES: &[&str] = &["@rpath/", "@loader_path/", "@executable_path/"];

/// Default library search paths plus any `LD_LIBRARY_PATH` entries.
#[must_use]
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        "/usr/lib",
        "/usr/lib64",
        "/usr/local/lib",
        "/usr/local/lib64",
        "/lib",
        "/lib64",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    if let Some(extra) = std::env::var_os("LD_LIBRARY_PATH") {
        for dir in std::env::split_paths(&extra) {
            if !dir.as_os_str().is_empty() && !paths.contains(&dir) {
                paths.push(dir);
            }
        }
    }
    paths
}

/// Find the file a dependency name refers to.
///
/// - absolute names are returned as given
/// - Mach-O `@rpath/`, `@loader_path/` and `@executable_path/` names are
///   looked up relative to `owner_dir`, the directory of the component that
///   declared the dependency
/// - anything else is tried in each search path as-is, then with `.so`
///   appended when the name carries no `.so`
#[must_use]
pub fn resolve_library_path(
    name: &str,
    owner_dir: Option<&Path>,
    search_paths: &[PathBuf],
) -> Option<PathBuf> {
    let as_path = Path::new(name);
    if as_path.is_absolute() {
        return Some(as_path.to_path_buf());
    }

    if let Some(rest) = LOADER_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
    {
        let candidate = owner_dir?.join(rest);
        return candidate.is_file().then_some(candidate);
    }

    for dir in search_paths {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !name.contains(".so") {
            let candidate = dir.join(format!("{name}.so"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
