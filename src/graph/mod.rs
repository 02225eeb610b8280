//! Component dependency graph.
//!
//! Nodes are [`ComponentInfo`] records keyed by logical name. Edges come from
//! each component's declared dependencies. [`DependencyGraph::resolve_dependencies`]
//! turns dependency names into nodes by locating them on disk (or, in
//! [`ResolutionMode::DeclaredOnly`], records them unresolved without looking).
//!
//! In live-filesystem mode the component count after resolution depends on
//! which libraries the scanning host has installed. That is expected.

mod provenance;
mod resolve;

pub use provenance::{
    classify_package_manager, extract_version_from_path, is_system_library, Provenance,
};
pub use resolve::{default_search_paths, resolve_library_path, ResolutionMode};

use crate::model::{ComponentInfo, SbomComponent};
use crate::scanner::{scan_file_named, ScanOptions};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Turns a located dependency file into a component.
pub trait ComponentLoader {
    /// Build the component for dependency `name` found at `path`, or `None`
    /// when the file cannot be read.
    fn load(&self, name: &str, path: &Path) -> Option<ComponentInfo>;
}

/// Loads dependencies by scanning them like any other input.
#[derive(Debug, Clone)]
pub struct FileLoader {
    options: ScanOptions,
}

impl FileLoader {
    #[must_use]
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }
}

impl Default for FileLoader {
    /// Libraries pulled in by resolution are not scanned for debug info.
    fn default() -> Self {
        Self::new(ScanOptions {
            extract_debug_info: false,
            ..ScanOptions::default()
        })
    }
}

impl ComponentLoader for FileLoader {
    fn load(&self, name: &str, path: &Path) -> Option<ComponentInfo> {
        match scan_file_named(name, path, &self.options) {
            Ok(component) => Some(component),
            Err(err) => {
                tracing::debug!(dependency = name, path = %path.display(), error = %err, "Resolved path unreadable");
                None
            }
        }
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    /// Dependencies turned into new nodes
    pub resolved: usize,
    /// Dependencies newly recorded as unresolved edges
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: IndexMap<String, ComponentInfo>,
    unresolved: IndexSet<String>,
    mode: ResolutionMode,
    search_paths: Vec<PathBuf>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new(ResolutionMode::default(), default_search_paths())
    }
}

impl DependencyGraph {
    #[must_use]
    pub fn new(mode: ResolutionMode, search_paths: Vec<PathBuf>) -> Self {
        Self {
            nodes: IndexMap::new(),
            unresolved: IndexSet::new(),
            mode,
            search_paths,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Register a component under its name.
    ///
    /// A second component with the same name is merged into the existing
    /// node, which keeps its position and identity. Returns `true` when the
    /// name was new.
    pub fn process_component(&mut self, component: ComponentInfo) -> bool {
        let name = component.name().to_string();
        self.unresolved.shift_remove(&name);
        match self.nodes.get_mut(&name) {
            Some(existing) => {
                let mut builder = existing.to_builder();
                builder.merge(&component);
                *existing = builder.finish();
                tracing::debug!(component = %name, "Merged repeated component");
                false
            }
            None => {
                self.nodes.insert(name, component);
                true
            }
        }
    }

    /// Resolve dependency names with the default [`FileLoader`].
    pub fn resolve_dependencies(&mut self, transitive: bool) -> ResolutionSummary {
        self.resolve_dependencies_with(transitive, &FileLoader::default())
    }

    /// Resolve dependency names into nodes.
    ///
    /// Direct dependencies of every current node are looked up. With
    /// `transitive`, the dependencies of newly resolved nodes are looked up
    /// too, until no new names appear. Each node is expanded at most once,
    /// so cycles terminate. Names that cannot be located stay as edges and
    /// are listed by [`DependencyGraph::unresolved`].
    pub fn resolve_dependencies_with(
        &mut self,
        transitive: bool,
        loader: &dyn ComponentLoader,
    ) -> ResolutionSummary {
        let mut summary = ResolutionSummary::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = self.nodes.keys().cloned().collect();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(component) = self.nodes.get(&name) else {
                continue;
            };
            let owner_dir = component.file_path().parent().map(Path::to_path_buf);
            let dependencies: Vec<String> = component.dependencies().map(str::to_string).collect();

            for dependency in dependencies {
                if self.nodes.contains_key(&dependency) {
                    if transitive {
                        queue.push_back(dependency);
                    }
                    continue;
                }
                if self.unresolved.contains(&dependency) {
                    continue;
                }

                let loaded = match self.mode {
                    ResolutionMode::DeclaredOnly => None,
                    ResolutionMode::LiveFilesystem => {
                        resolve_library_path(&dependency, owner_dir.as_deref(), &self.search_paths)
                            .and_then(|path| loader.load(&dependency, &path))
                    }
                };
                match loaded {
                    Some(resolved) => {
                        tracing::debug!(component = %name, dependency = %dependency, path = %resolved.file_path().display(), "Resolved dependency");
                        self.nodes.insert(dependency.clone(), resolved);
                        summary.resolved += 1;
                        if transitive {
                            queue.push_back(dependency);
                        }
                    }
                    None => {
                        tracing::debug!(component = %name, dependency = %dependency, "Unresolved dependency");
                        self.unresolved.insert(dependency);
                        summary.unresolved += 1;
                    }
                }
            }
        }

        tracing::info!(
            components = self.nodes.len(),
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            "Dependency resolution complete"
        );
        summary
    }

    /// Number of distinct nodes.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentInfo> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Nodes in insertion order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.nodes.values()
    }

    /// Dependency names that have no node.
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.unresolved.iter().map(String::as_str)
    }

    /// Project the graph into format-neutral components.
    ///
    /// Unresolved dependencies become placeholder components so every edge
    /// points at something. Without `include_system_libraries`, nodes flagged
    /// as system libraries are left out together with the edges to them.
    #[must_use]
    pub fn sbom_components(&self, include_system_libraries: bool) -> Vec<SbomComponent> {
        let mut components: Vec<SbomComponent> = self
            .nodes
            .values()
            .filter(|c| include_system_libraries || !c.is_system_library())
            .map(SbomComponent::from_component_info)
            .collect();
        components.extend(self.unresolved.iter().map(|name| SbomComponent::unresolved(name)));

        let ids: HashSet<String> = components.iter().map(|c| c.id.clone()).collect();
        for component in &mut components {
            component.retain_dependencies(|dep| ids.contains(dep));
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out canned components instead of scanning files.
    struct FixedLoader(Vec<ComponentInfo>);

    impl ComponentLoader for FixedLoader {
        fn load(&self, name: &str, _path: &Path) -> Option<ComponentInfo> {
            self.0.iter().find(|c| c.name() == name).cloned()
        }
    }

    fn component(name: &str, path: &str, deps: &[&str]) -> ComponentInfo {
        let mut builder = ComponentInfo::builder(name, path);
        for dep in deps {
            builder.dependency(*dep);
        }
        builder.finish()
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"\x7fELF").unwrap();
    }

    #[test]
    fn test_reprocessing_keeps_identity() {
        let mut graph = DependencyGraph::new(ResolutionMode::DeclaredOnly, Vec::new());
        assert!(graph.process_component(component("app", "/build/app", &["libm.so.6"])));

        let mut update = ComponentInfo::builder("app", "/build/app");
        update.version("2.0").dependency("libc.so.6");
        assert!(!graph.process_component(update.finish()));

        assert_eq!(graph.component_count(), 1);
        let app = graph.get("app").unwrap();
        assert_eq!(app.version(), Some("2.0"));
        assert_eq!(app.dependency_count(), 2);
    }

    #[test]
    fn test_declared_only_records_unresolved_edges() {
        let mut graph = DependencyGraph::new(ResolutionMode::DeclaredOnly, vec![PathBuf::from("/usr/lib")]);
        graph.process_component(component("app", "/build/app", &["libc.so.6", "libfoo.so"]));

        let summary = graph.resolve_dependencies(true);
        assert_eq!(summary, ResolutionSummary { resolved: 0, unresolved: 2 });
        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.unresolved().collect::<Vec<_>>(), ["libc.so.6", "libfoo.so"]);
    }

    #[test]
    fn test_transitive_resolution_handles_cycles() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "liba.so");
        touch(dir.path(), "libb.so");
        let loader = FixedLoader(vec![
            component("liba.so", "liba.so", &["libb.so"]),
            component("libb.so", "libb.so", &["liba.so", "libgone.so"]),
        ]);

        let mut graph = DependencyGraph::new(ResolutionMode::LiveFilesystem, vec![dir.path().to_path_buf()]);
        graph.process_component(component("app", "/build/app", &["liba.so"]));

        let summary = graph.resolve_dependencies_with(true, &loader);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(graph.component_count(), 3);
        assert!(graph.contains("libb.so"));
        assert_eq!(graph.unresolved().collect::<Vec<_>>(), ["libgone.so"]);
    }

    #[test]
    fn test_direct_resolution_stops_at_first_level() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "liba.so");
        touch(dir.path(), "libb.so");
        let loader = FixedLoader(vec![
            component("liba.so", "liba.so", &["libb.so"]),
            component("libb.so", "libb.so", &[]),
        ]);

        let mut graph = DependencyGraph::new(ResolutionMode::LiveFilesystem, vec![dir.path().to_path_buf()]);
        graph.process_component(component("app", "/build/app", &["liba.so"]));

        graph.resolve_dependencies_with(false, &loader);
        assert_eq!(graph.component_count(), 2);
        assert!(!graph.contains("libb.so"));
    }

    #[test]
    fn test_sbom_projection_filters_system_libraries() {
        let mut graph = DependencyGraph::new(ResolutionMode::DeclaredOnly, Vec::new());
        graph.process_component(component("app", "/build/app", &["libc.so.6", "libfoo.so"]));
        let mut libc = ComponentInfo::builder("libc.so.6", "/usr/lib/libc.so.6");
        libc.system_library(true);
        graph.process_component(libc.finish());
        graph.resolve_dependencies(false);

        let without = graph.sbom_components(false);
        let ids: Vec<_> = without.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["app", "libfoo.so"]);
        assert_eq!(without[0].dependencies(), ["libfoo.so"]);

        let with = graph.sbom_components(true);
        assert_eq!(with.len(), 3);
        assert_eq!(with[0].dependencies(), ["libc.so.6", "libfoo.so"]);
    }
}
