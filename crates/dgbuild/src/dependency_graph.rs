//! Audit of declared module dependencies.
//!
//! Resolution only expands one level of `deps`, so every module is expected to declare a
//! flat, correctly ordered list. This graph checks that expectation and reports mistakes to
//! config authors; it never changes what gets bundled.

use indexmap::IndexSet;
use log::debug;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use rustc_hash::FxHashMap;
use std::fmt;

use crate::registry::ModuleRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFinding {
    /// A declared dependency is not a registered module
    UnknownDependency { module: String, dependency: String },
    /// Modules that depend on each other, directly or not
    Cycle { modules: Vec<String> },
    /// `module` needs `missing` through `via` but does not declare it
    Unflattened {
        module: String,
        missing: String,
        via: String,
    },
    /// `dependency` is declared before `needs`, which it depends on
    Misordered {
        module: String,
        dependency: String,
        needs: String,
    },
}

impl fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDependency { module, dependency } => {
                write!(f, "{module} depends on unknown module {dependency}")
            }
            Self::Cycle { modules } => {
                write!(f, "circular dependency: {}", modules.join(" → "))
            }
            Self::Unflattened {
                module,
                missing,
                via,
            } => write!(
                f,
                "{module} needs {missing} (through {via}) but does not declare it"
            ),
            Self::Misordered {
                module,
                dependency,
                needs,
            } => write!(
                f,
                "{module} declares {dependency} before {needs}, which {dependency} depends on"
            ),
        }
    }
}

/// Graph of declared dependencies. Edges point from a dependency to its dependent.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_indices: FxHashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_registry(registry: &ModuleRegistry) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = FxHashMap::default();

        for name in registry.module_names() {
            let index = graph.add_node(name.to_owned());
            node_indices.insert(name.to_owned(), index);
        }

        for (name, entry) in registry.iter() {
            let to = node_indices[name];
            for dep in &entry.deps {
                if let Some(&from) = node_indices.get(dep) {
                    if !graph.contains_edge(from, to) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        debug!(
            "Dependency graph: {} modules, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self {
            graph,
            node_indices,
        }
    }

    /// Every module `module` depends on, directly or not, in registry order
    pub fn transitive_dependencies(&self, module: &str) -> IndexSet<String> {
        let Some(&start) = self.node_indices.get(module) else {
            return IndexSet::new();
        };

        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut found = Vec::new();
        while let Some(index) = dfs.next(reversed) {
            if index != start {
                found.push(index);
            }
        }
        found.sort();
        found.into_iter().map(|index| self.graph[index].clone()).collect()
    }

    fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect();
        cycles.sort();
        cycles
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }

    /// Check every module's declared list against the graph
    pub fn audit(&self, registry: &ModuleRegistry) -> Vec<AuditFinding> {
        let mut findings = Vec::new();

        for (name, entry) in registry.iter() {
            for dep in &entry.deps {
                if !registry.contains(dep) {
                    findings.push(AuditFinding::UnknownDependency {
                        module: name.to_owned(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        for modules in self.cycles() {
            findings.push(AuditFinding::Cycle { modules });
        }

        for (name, entry) in registry.iter() {
            let declared: IndexSet<&str> = entry.deps.iter().map(String::as_str).collect();
            let mut reported: IndexSet<String> = IndexSet::new();

            for (position, dep) in entry.deps.iter().enumerate() {
                let needs = self.transitive_dependencies(dep);

                for missing in &needs {
                    if missing != name && !declared.contains(missing.as_str()) && reported.insert(missing.clone()) {
                        findings.push(AuditFinding::Unflattened {
                            module: name.to_owned(),
                            missing: missing.clone(),
                            via: dep.clone(),
                        });
                    }
                }

                for later in entry.deps.iter().skip(position + 1) {
                    if later != dep && needs.contains(later) {
                        findings.push(AuditFinding::Misordered {
                            module: name.to_owned(),
                            dependency: dep.clone(),
                            needs: later.clone(),
                        });
                    }
                }
            }
        }

        findings
    }
}
