use indexmap::IndexMap;
use log::{Level, log};
use rustc_hash::FxHashSet;

use crate::config::Package;
use crate::registry::ModuleRegistry;
use crate::util::progress_level;

/// How a build request was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    /// A package with a non-empty module list
    Package,
    /// A comma-separated list of module names
    ModuleList,
    /// A single registered module
    Module,
    /// Anything else: every registered module
    All,
}

/// Result of expanding a build request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Modules in load order, without duplicates
    pub modules: Vec<String>,
    /// Requested names that are not registered, in request order
    pub unknown: Vec<String>,
}

/// Expands package/module specifiers into an ordered module list
#[derive(Debug)]
pub struct ModuleResolver<'a> {
    registry: &'a ModuleRegistry,
    packages: &'a IndexMap<String, Package>,
    quiet: bool,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(registry: &'a ModuleRegistry, packages: &'a IndexMap<String, Package>) -> Self {
        Self {
            registry,
            packages,
            quiet: false,
        }
    }

    /// Log the module listing at `debug` instead of `info`, for per-request resolution
    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Decide how a specifier is read. The order of the checks matters: a package name wins
    /// over a module list, which wins over a single module.
    pub fn classify(&self, spec: Option<&str>) -> SpecKind {
        let Some(spec) = spec else {
            return SpecKind::All;
        };

        if self
            .packages
            .get(spec)
            .is_some_and(|package| !package.modules.is_empty())
        {
            SpecKind::Package
        } else if spec.find(',').is_some_and(|pos| pos > 0) {
            SpecKind::ModuleList
        } else if self.registry.contains(spec) {
            SpecKind::Module
        } else {
            SpecKind::All
        }
    }

    /// The module names a specifier asks for, before dependency expansion
    pub fn requested(&self, spec: Option<&str>) -> Vec<String> {
        match (self.classify(spec), spec) {
            (SpecKind::Package, Some(name)) => self
                .packages
                .get(name)
                .map(|package| package.modules.clone())
                .unwrap_or_default(),
            (SpecKind::ModuleList, Some(list)) => list.split(',').map(str::to_owned).collect(),
            (SpecKind::Module, Some(name)) => vec![name.to_owned()],
            _ => self.registry.module_names().map(str::to_owned).collect(),
        }
    }

    /// Expand a specifier into the load order.
    ///
    /// Each requested module's declared dependencies are appended first, one level deep and
    /// in declaration order, then the module itself. Dependencies of dependencies are not
    /// followed: config authors are expected to declare flat dependency lists.
    pub fn resolve(&self, spec: Option<&str>) -> Resolution {
        let requested = self.requested(spec);
        let mut resolution = Resolution::default();
        let mut seen: FxHashSet<&str> = FxHashSet::default();

        let level = progress_level(self.quiet);
        let missing_level = if self.quiet { Level::Debug } else { Level::Warn };
        log!(level, "Build modules:");

        for name in &requested {
            let Some(entry) = self.registry.get(name) else {
                log!(missing_level, "  - {name} (not found)");
                resolution.unknown.push(name.clone());
                continue;
            };

            for dep in &entry.deps {
                if seen.insert(dep.as_str()) {
                    log!(level, "  + {dep} (deps of {name})");
                    resolution.modules.push(dep.clone());
                }
            }

            if seen.insert(name.as_str()) {
                log!(level, "  * {name}");
                resolution.modules.push(name.clone());
            }
        }

        resolution
    }
}
