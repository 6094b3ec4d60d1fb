// src/resolver/mod.rs

//! Dependency resolution for module upgrades
//!
//! Turns an upgrade request into an ordered installation plan (the
//! resolution graph). The upgrade workflow only consumes the
//! `ConstraintResolver` trait; `GreedyResolver` is the single-pass
//! implementation used by the command line tool.

use crate::error::{Error, Result};
use crate::inventory::{ConstraintSource, LocalInventory, ModuleDependency};
use crate::inventory::metadata::{dir_name, normalize_name};
use crate::repository::{RemoteRegistry, RemoteRelease};
use crate::version::{self, VersionRequirement};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What installing a graph node does to the module tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Install,
    Upgrade,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Install => write!(f, "install"),
            Action::Upgrade => write!(f, "upgrade"),
        }
    }
}

/// One planned installation in a resolution graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub module_name: String,
    pub version: String,
    /// Version being replaced, for upgrades of versioned modules
    pub previous_version: Option<String>,
    pub action: Action,
    /// Archive location published by the registry
    pub file_uri: Option<String>,
    /// Modulepath directory the module is unpacked into
    pub install_path: PathBuf,
    /// Directory name under `install_path`; an existing install keeps its own
    pub dir_name: String,
}

impl GraphNode {
    /// Directory the module occupies once installed
    pub fn module_dir(&self) -> PathBuf {
        self.install_path.join(&self.dir_name)
    }
}

/// Input to a resolver run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub module_name: String,
    /// Explicit version or requirement; `None` means "newest allowed"
    pub requested_version: Option<String>,
    pub ignore_dependencies: bool,
    pub force: bool,
}

/// Produces the ordered resolution graph for a request
pub trait ConstraintResolver {
    /// Resolve a request into graph nodes, root first
    ///
    /// An empty graph means nothing needs to change. Fails with
    /// `Error::Unsatisfiable` when no release meets the active constraints.
    fn resolve(&self, request: &ResolveRequest) -> Result<Vec<GraphNode>>;
}

/// A named requirement taking part in release selection
struct ActiveRequirement {
    source: String,
    requirement: VersionRequirement,
}

/// Single-pass resolver: newest acceptable release, no backtracking
pub struct GreedyResolver<'a> {
    registry: &'a dyn RemoteRegistry,
    inventory: &'a dyn LocalInventory,
    target_dir: PathBuf,
}

impl<'a> GreedyResolver<'a> {
    pub fn new(
        registry: &'a dyn RemoteRegistry,
        inventory: &'a dyn LocalInventory,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            inventory,
            target_dir: target_dir.into(),
        }
    }

    /// Walk a release's dependencies depth-first, planning whatever is
    /// missing or unsatisfied locally
    fn plan_dependencies(
        &self,
        dependencies: &[ModuleDependency],
        required_by: &str,
        graph: &mut Vec<GraphNode>,
        planned: &mut HashSet<String>,
    ) -> Result<()> {
        for dep in dependencies {
            let key = normalize_name(&dep.name);
            if planned.contains(&key) {
                continue;
            }

            let requirement = dep_requirement(dep, required_by);
            let local = self.inventory.find(&dep.name)?;
            let installed = local.installed.first();

            if let Some(module) = installed {
                let current = module.version.as_deref().unwrap_or(version::ZERO_VERSION);
                if requirement.matches(current) {
                    debug!("'{}' {} already satisfies {}", dep.name, current, requirement);
                    continue;
                }
            }

            let releases = self.registry.releases(&dep.name)?;
            let active = [ActiveRequirement {
                source: required_by.to_string(),
                requirement,
            }];
            let release = select_release(&releases, &active).ok_or_else(|| {
                unsatisfiable(&dep.name, &active)
            })?;

            let node = match installed {
                Some(module) => GraphNode {
                    module_name: dep.name.clone(),
                    version: release.version.clone(),
                    previous_version: module.version.clone(),
                    action: Action::Upgrade,
                    file_uri: release.file_uri.clone(),
                    install_path: module.modulepath.clone(),
                    dir_name: module.dir_name().to_string(),
                },
                None => GraphNode {
                    module_name: dep.name.clone(),
                    version: release.version.clone(),
                    previous_version: None,
                    action: Action::Install,
                    file_uri: release.file_uri.clone(),
                    install_path: self.target_dir.clone(),
                    dir_name: dir_name(&dep.name).to_string(),
                },
            };

            debug!("Planning {} of '{}' {}", node.action, node.module_name, node.version);
            planned.insert(key);
            graph.push(node);
            self.plan_dependencies(&release.dependencies, &dep.name, graph, planned)?;
        }

        Ok(())
    }
}

impl ConstraintResolver for GreedyResolver<'_> {
    fn resolve(&self, request: &ResolveRequest) -> Result<Vec<GraphNode>> {
        let local = self.inventory.find(&request.module_name)?;
        let installed = local.installed.first();

        let mut active = Vec::new();
        if let Some(requested) = &request.requested_version {
            active.push(ActiveRequirement {
                source: ConstraintSource::Request.to_string(),
                requirement: VersionRequirement::parse(requested)?,
            });
        }
        if !request.ignore_dependencies {
            for condition in &local.conditions {
                let Some(raw) = &condition.requirement else {
                    continue;
                };
                match VersionRequirement::parse(raw) {
                    Ok(requirement) => active.push(ActiveRequirement {
                        source: condition.source.to_string(),
                        requirement,
                    }),
                    Err(e) => warn!("Ignoring requirement from {}: {}", condition.source, e),
                }
            }
        }

        let releases = self.registry.releases(&request.module_name)?;
        let root = select_release(&releases, &active)
            .ok_or_else(|| unsatisfiable(&request.module_name, &active))?;

        if let Some(module) = installed {
            let current = module.version.as_deref().unwrap_or(version::ZERO_VERSION);
            if !request.force && version::compare(current, &root.version).is_eq() {
                info!(
                    "'{}' is already at {}; nothing to do",
                    request.module_name,
                    version::normalize(Some(current))
                );
                return Ok(Vec::new());
            }
        }

        let root_node = GraphNode {
            module_name: request.module_name.clone(),
            version: root.version.clone(),
            previous_version: installed.and_then(|m| m.version.clone()),
            action: if installed.is_some() { Action::Upgrade } else { Action::Install },
            file_uri: root.file_uri.clone(),
            install_path: installed
                .map(|m| m.modulepath.clone())
                .unwrap_or_else(|| self.target_dir.clone()),
            dir_name: installed
                .map(|m| m.dir_name().to_string())
                .unwrap_or_else(|| dir_name(&request.module_name).to_string()),
        };

        let mut graph = vec![root_node];
        let mut planned = HashSet::from([normalize_name(&request.module_name)]);
        if !request.ignore_dependencies {
            self.plan_dependencies(&root.dependencies, &request.module_name, &mut graph, &mut planned)?;
        }

        debug!("Resolved {} node(s) for '{}'", graph.len(), request.module_name);
        Ok(graph)
    }
}

/// Requirement a dependency declaration places on its target
fn dep_requirement(dep: &ModuleDependency, required_by: &str) -> VersionRequirement {
    match dep.version_requirement.as_deref() {
        None => VersionRequirement::any(),
        Some(raw) => VersionRequirement::parse(raw).unwrap_or_else(|e| {
            warn!("Ignoring requirement from {}: {}", required_by, e);
            VersionRequirement::any()
        }),
    }
}

/// Newest release satisfying every requirement
fn select_release<'r>(
    releases: &'r [RemoteRelease],
    active: &[ActiveRequirement],
) -> Option<&'r RemoteRelease> {
    releases
        .iter()
        .filter(|r| active.iter().all(|a| a.requirement.matches(&r.version)))
        .max_by(|a, b| version::compare(&a.version, &b.version))
}

fn unsatisfiable(module_name: &str, active: &[ActiveRequirement]) -> Error {
    if active.is_empty() {
        return Error::Unsatisfiable(format!("no releases of '{}' available", module_name));
    }

    let wanted = active
        .iter()
        .map(|a| format!("{} (from {})", a.requirement, a.source))
        .collect::<Vec<_>>()
        .join(", ");
    Error::Unsatisfiable(format!("no release of '{}' matches {}", module_name, wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Constraint, InstalledModule, InventoryMatch};
    use std::collections::HashMap;
    use std::path::Path;

    #[derive(Default)]
    struct FakeInventory {
        modules: HashMap<String, InventoryMatch>,
    }

    impl FakeInventory {
        fn install(mut self, name: &str, version: &str, modulepath: &str) -> Self {
            self.modules.entry(name.to_string()).or_default().installed.push(InstalledModule {
                name: name.to_string(),
                version: Some(version.to_string()),
                install_path: Path::new(modulepath).join(crate::inventory::metadata::dir_name(name)),
                modulepath: PathBuf::from(modulepath),
                precedence: 0,
                metadata: None,
            });
            self
        }

        fn condition(mut self, name: &str, source: &str, requirement: &str) -> Self {
            self.modules
                .entry(name.to_string())
                .or_default()
                .conditions
                .push(Constraint::from_module(source, requirement));
            self
        }
    }

    impl LocalInventory for FakeInventory {
        fn find(&self, module_name: &str) -> Result<InventoryMatch> {
            Ok(self.modules.get(module_name).cloned().unwrap_or_default())
        }

        fn has_local_changes(&self, _module: &InstalledModule) -> Result<bool> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        releases: HashMap<String, Vec<RemoteRelease>>,
    }

    impl FakeRegistry {
        fn publish(mut self, name: &str, version: &str, deps: &[(&str, Option<&str>)]) -> Self {
            let mut release = RemoteRelease::new(version);
            release.file_uri = Some(format!("/v3/files/{}-{}.tar.gz", name, version));
            release.dependencies = deps
                .iter()
                .map(|(dep, req)| ModuleDependency::new(*dep, *req))
                .collect();
            self.releases.entry(name.to_string()).or_default().push(release);
            self
        }
    }

    impl RemoteRegistry for FakeRegistry {
        fn uri(&self) -> &str {
            "https://forge.test"
        }

        fn releases(&self, module_name: &str) -> Result<Vec<RemoteRelease>> {
            self.releases
                .get(module_name)
                .cloned()
                .ok_or_else(|| Error::NotFound(module_name.to_string()))
        }
    }

    fn request(name: &str, version: Option<&str>) -> ResolveRequest {
        ResolveRequest {
            module_name: name.to_string(),
            requested_version: version.map(str::to_string),
            ignore_dependencies: false,
            force: false,
        }
    }

    #[test]
    fn test_resolve_picks_newest_release() {
        let inventory = FakeInventory::default().install("acme-ntp", "1.0.0", "/modules");
        let registry = FakeRegistry::default()
            .publish("acme-ntp", "1.0.0", &[])
            .publish("acme-ntp", "1.10.0", &[])
            .publish("acme-ntp", "1.2.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let graph = resolver.resolve(&request("acme-ntp", None)).unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph[0].version, "1.10.0");
        assert_eq!(graph[0].previous_version.as_deref(), Some("1.0.0"));
        assert_eq!(graph[0].action, Action::Upgrade);
        assert_eq!(graph[0].install_path, PathBuf::from("/modules"));
        assert_eq!(graph[0].file_uri.as_deref(), Some("/v3/files/acme-ntp-1.10.0.tar.gz"));
        assert_eq!(graph[0].module_dir(), PathBuf::from("/modules/ntp"));
    }

    #[test]
    fn test_resolve_keeps_existing_directory_name() {
        let mut inventory = FakeInventory::default().install("acme-ntp", "1.0.0", "/modules");
        inventory.modules.get_mut("acme-ntp").unwrap().installed[0].install_path =
            PathBuf::from("/modules/timesync");
        let registry = FakeRegistry::default()
            .publish("acme-ntp", "2.0.0", &[("acme-stdlib", None)])
            .publish("acme-stdlib", "1.0.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let graph = resolver.resolve(&request("acme-ntp", None)).unwrap();

        assert_eq!(graph[0].module_dir(), PathBuf::from("/modules/timesync"));
        assert_eq!(graph[1].module_dir(), PathBuf::from("/target/stdlib"));
    }

    #[test]
    fn test_resolve_honors_explicit_version() {
        let inventory = FakeInventory::default().install("acme-ntp", "1.0.0", "/modules");
        let registry = FakeRegistry::default()
            .publish("acme-ntp", "1.2.0", &[])
            .publish("acme-ntp", "2.0.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let exact = resolver.resolve(&request("acme-ntp", Some("1.2.0"))).unwrap();
        let range = resolver.resolve(&request("acme-ntp", Some("1.x"))).unwrap();

        assert_eq!(exact[0].version, "1.2.0");
        assert_eq!(range[0].version, "1.2.0");
    }

    #[test]
    fn test_resolve_respects_conditions_unless_ignored() {
        let inventory = FakeInventory::default()
            .install("acme-stdlib", "1.0.0", "/modules")
            .condition("acme-stdlib", "acme-ntp", ">= 1.0.0 < 2.0.0");
        let registry = FakeRegistry::default()
            .publish("acme-stdlib", "1.0.0", &[])
            .publish("acme-stdlib", "1.5.0", &[])
            .publish("acme-stdlib", "2.0.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let constrained = resolver.resolve(&request("acme-stdlib", None)).unwrap();
        assert_eq!(constrained[0].version, "1.5.0");

        let mut ignoring = request("acme-stdlib", None);
        ignoring.ignore_dependencies = true;
        assert_eq!(resolver.resolve(&ignoring).unwrap()[0].version, "2.0.0");
    }

    #[test]
    fn test_resolve_unsatisfiable() {
        let inventory = FakeInventory::default()
            .install("acme-stdlib", "1.0.0", "/modules")
            .condition("acme-stdlib", "acme-ntp", ">= 1.0.0 < 2.0.0");
        let registry = FakeRegistry::default().publish("acme-stdlib", "2.0.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let err = resolver.resolve(&request("acme-stdlib", Some("2.0.0"))).unwrap_err();

        match err {
            Error::Unsatisfiable(msg) => {
                assert!(msg.contains("acme-stdlib"));
                assert!(msg.contains("from acme-ntp"));
                assert!(msg.contains("from you"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_resolve_already_current_is_empty() {
        let inventory = FakeInventory::default().install("acme-ntp", "v2.0.0", "/modules");
        let registry = FakeRegistry::default().publish("acme-ntp", "2.0.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        assert!(resolver.resolve(&request("acme-ntp", None)).unwrap().is_empty());

        let mut forced = request("acme-ntp", None);
        forced.force = true;
        assert_eq!(resolver.resolve(&forced).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_plans_dependencies_depth_first() {
        let inventory = FakeInventory::default()
            .install("acme-ntp", "1.0.0", "/modules")
            .install("acme-concat", "1.0.0", "/site")
            .install("acme-stdlib", "4.1.0", "/modules");
        let registry = FakeRegistry::default()
            .publish(
                "acme-ntp",
                "2.0.0",
                &[
                    ("acme-firewall", Some(">= 1.0.0")),
                    ("acme-stdlib", Some(">= 4.0.0")),
                    ("acme-concat", Some(">= 2.0.0")),
                ],
            )
            .publish("acme-firewall", "1.3.0", &[("acme-augeas", None)])
            .publish("acme-augeas", "0.4.0", &[("acme-ntp", None)])
            .publish("acme-concat", "2.2.0", &[]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let graph = resolver.resolve(&request("acme-ntp", None)).unwrap();

        let planned: Vec<(&str, &str, Action)> = graph
            .iter()
            .map(|n| (n.module_name.as_str(), n.version.as_str(), n.action))
            .collect();
        assert_eq!(
            planned,
            vec![
                ("acme-ntp", "2.0.0", Action::Upgrade),
                ("acme-firewall", "1.3.0", Action::Install),
                ("acme-augeas", "0.4.0", Action::Install),
                ("acme-concat", "2.2.0", Action::Upgrade),
            ]
        );
        assert_eq!(graph[1].install_path, PathBuf::from("/target"));
        assert_eq!(graph[3].install_path, PathBuf::from("/site"));
    }

    #[test]
    fn test_resolve_ignore_dependencies_skips_graph_walk() {
        let inventory = FakeInventory::default().install("acme-ntp", "1.0.0", "/modules");
        let registry = FakeRegistry::default()
            .publish("acme-ntp", "2.0.0", &[("acme-firewall", None)]);

        let resolver = GreedyResolver::new(&registry, &inventory, "/target");
        let mut req = request("acme-ntp", None);
        req.ignore_dependencies = true;

        assert_eq!(resolver.resolve(&req).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_module_propagates() {
        let inventory = FakeInventory::default();
        let registry = FakeRegistry::default();
        let resolver = GreedyResolver::new(&registry, &inventory, "/target");

        assert!(matches!(
            resolver.resolve(&request("acme-missing", None)),
            Err(Error::NotFound(_))
        ));
    }
}
