use indexmap::IndexMap;
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::{Config, ModuleSource};
use crate::registry::{BASIC_SKIN, BrowserVariant, ModuleEntry, ModuleRegistry, SkinConfig};
use crate::report::{ErrorCategory, RunReport};

/// Registry produced by a load, with the problems met along the way
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub registry: ModuleRegistry,
    pub report: RunReport,
}

/// Reads every declared module's sources into a [`ModuleRegistry`].
///
/// Source paths are built by plain string concatenation of the creator's base path and the
/// declared entry; that string is the file's identity everywhere downstream. Disk access
/// resolves it against the configured root.
#[derive(Debug)]
pub struct SourceLoader<'a> {
    config: &'a Config,
}

impl<'a> SourceLoader<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Load every module of every creator. Never fails: missing files are logged and recorded.
    pub fn load(&self) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        for (creator, group) in &self.config.source {
            debug!("Loading {} modules of '{}'", group.deps.len(), creator);
            for (name, source) in &group.deps {
                let entry = self.load_module(name, &group.path, source, &mut outcome);
                if outcome.registry.insert_module(name.clone(), entry).is_some() {
                    warn!("Module {name} is declared more than once, the declaration in '{creator}' wins");
                }
                // CSS rows are added after the module so a redeclaration cannot wipe them
                self.load_css(name, &group.path, source, &mut outcome);
            }
        }

        info!(
            "Loaded {} modules ({} CSS files)",
            outcome.registry.len(),
            outcome.registry.css_len()
        );
        outcome
    }

    fn load_module(
        &self,
        name: &str,
        base_path: &str,
        source: &ModuleSource,
        outcome: &mut LoadOutcome,
    ) -> ModuleEntry {
        let mut entry = ModuleEntry::new(source.deps.clone());
        entry.js = self.load_js(base_path, &source.src, &mut outcome.report);
        entry.conf = self.load_skin_configs(name, base_path, &source.src, &mut outcome.report);
        entry
    }

    /// Plain JS files; paths with the skin placeholder are left to the skin-config step
    fn load_js(
        &self,
        base_path: &str,
        sources: &[String],
        report: &mut RunReport,
    ) -> IndexMap<String, String> {
        let mut js = IndexMap::new();

        for src in sources {
            let path = format!("{base_path}{src}");
            if path.contains(&self.config.skin_var) {
                continue;
            }
            if let Some(content) = self.read_source(&path, report) {
                js.insert(path, content + "\n\n");
            }
        }

        js
    }

    fn load_skin_configs(
        &self,
        module: &str,
        base_path: &str,
        sources: &[String],
        report: &mut RunReport,
    ) -> IndexMap<String, SkinConfig> {
        let mut conf = IndexMap::new();

        for src in sources {
            let path = format!("{base_path}{src}");
            if !path.contains(&self.config.skin_var) {
                continue;
            }
            for (skin, skin_path) in self.expand_skins(&path, report) {
                if let Some(content) = self.read_source(&skin_path, report) {
                    debug!("Skin config of {module} for '{skin}': {skin_path}");
                    conf.insert(
                        skin,
                        SkinConfig {
                            path: skin_path,
                            content: content + "\n",
                        },
                    );
                }
            }
        }

        conf
    }

    fn load_css(&self, module: &str, base_path: &str, source: &ModuleSource, outcome: &mut LoadOutcome) {
        for (&variant, files) in &source.css {
            for src in files {
                let path = format!("{base_path}{src}");
                if path.contains(&self.config.skin_var) {
                    for (skin, skin_path) in self.expand_skins(&path, &mut outcome.report) {
                        if let Some(content) = self.read_source(&skin_path, &mut outcome.report) {
                            outcome
                                .registry
                                .insert_css(module, &skin, variant, skin_path, content + "\n");
                        }
                    }
                } else if let Some(content) = self.read_source(&path, &mut outcome.report) {
                    outcome
                        .registry
                        .insert_css(module, BASIC_SKIN, variant, path, content + "\n");
                }
            }
        }
    }

    /// Expand a path holding the skin placeholder into `(skin, path)` pairs.
    ///
    /// Every entry of the directory before the placeholder is a candidate skin; only
    /// candidates whose expanded path is an existing file are returned, sorted by skin name.
    fn expand_skins(&self, path: &str, report: &mut RunReport) -> Vec<(String, String)> {
        let Some((prefix, suffix)) = path.split_once(self.config.skin_var.as_str()) else {
            return Vec::new();
        };

        let skins_dir = self.disk_path(prefix);
        if !skins_dir.is_dir() {
            warn!("Error! Skins directory {prefix} not found!");
            report.record(ErrorCategory::MissingFile);
            return Vec::new();
        }

        WalkDir::new(&skins_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.file_name().to_string_lossy().into_owned()),
                Err(err) => {
                    warn!("Failed to read skins directory {prefix}: {err}");
                    None
                }
            })
            .map(|skin| {
                let skin_path = format!("{prefix}{skin}{suffix}");
                (skin, skin_path)
            })
            .filter(|(_, skin_path)| self.disk_path(skin_path).is_file())
            .collect()
    }

    /// Concatenate the copyright banner files, each followed by a newline
    pub fn load_copyrights(&self, report: &mut RunReport) -> String {
        let mut copyrights = String::new();
        for path in &self.config.copyrights {
            let path = path.to_string_lossy();
            if let Some(content) = self.read_source(&path, report) {
                copyrights.push_str(&content);
                copyrights.push('\n');
            }
        }
        copyrights
    }

    fn disk_path(&self, path: &str) -> PathBuf {
        self.config.resolve_path(path)
    }

    fn read_source(&self, path: &str, report: &mut RunReport) -> Option<String> {
        let disk_path = self.disk_path(path);
        if !disk_path.is_file() {
            warn!("Error! File {path} not found!");
            report.record(ErrorCategory::MissingFile);
            return None;
        }
        match fs::read_to_string(&disk_path) {
            Ok(content) => Some(content),
            Err(err) => {
                warn!("Error! File {path} could not be read: {err}");
                report.record(ErrorCategory::MissingFile);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceGroup;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().expect("fixture path has a parent")).expect("create dirs");
        fs::write(path, content).expect("write fixture");
    }

    fn config_for(root: &Path, modules: Vec<(&str, ModuleSource)>) -> Config {
        let mut group = SourceGroup {
            path: "src/".to_owned(),
            ..SourceGroup::default()
        };
        for (name, source) in modules {
            group.deps.insert(name.to_owned(), source);
        }
        let mut config = Config {
            root: root.to_path_buf(),
            ..Config::default()
        };
        config.source.insert("dg".to_owned(), group);
        config
    }

    #[test]
    fn test_js_files_skip_skin_placeholder_paths() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "src/Core/Core.js", "CORE;");
        write(dir.path(), "src/Core/skin/basic/config.js", "BASIC_CONF;");
        write(dir.path(), "src/Core/skin/dark/config.js", "DARK_CONF;");
        // A skin directory without the config file is not a candidate
        fs::create_dir_all(dir.path().join("src/Core/skin/light")).expect("create dir");

        let source = ModuleSource {
            src: vec!["Core/Core.js".to_owned(), "Core/skin/{skin}/config.js".to_owned()],
            ..ModuleSource::default()
        };
        let config = config_for(dir.path(), vec![("Core", source)]);
        let outcome = SourceLoader::new(&config).load();

        assert!(outcome.report.is_success());
        let core = outcome.registry.get("Core").expect("Core is loaded");
        let js: Vec<_> = core.js.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        assert_eq!(js, vec![("src/Core/Core.js", "CORE;\n\n")]);

        let skins: Vec<_> = core.conf.keys().map(String::as_str).collect();
        assert_eq!(skins, vec!["basic", "dark"]);
        assert_eq!(core.conf["dark"].content, "DARK_CONF;\n");
        assert_eq!(core.conf["dark"].path, "src/Core/skin/dark/config.js");
    }

    #[test]
    fn test_css_is_split_into_basic_and_skins() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "src/Core/css/core.css", ".core{}");
        write(dir.path(), "src/Core/css/core.ie.css", ".core-ie{}");
        write(dir.path(), "src/Core/skin/default/css/skin.css", ".default{}");
        write(dir.path(), "src/Core/skin/dark/css/skin.css", ".dark{}");

        let mut css = IndexMap::new();
        css.insert(
            BrowserVariant::All,
            vec!["Core/css/core.css".to_owned(), "Core/skin/{skin}/css/skin.css".to_owned()],
        );
        css.insert(BrowserVariant::Ie, vec!["Core/css/core.ie.css".to_owned()]);
        let source = ModuleSource {
            css,
            ..ModuleSource::default()
        };
        let config = config_for(dir.path(), vec![("Core", source)]);
        let registry = SourceLoader::new(&config).load().registry;

        let basic: Vec<_> = registry
            .css_files("Core", BASIC_SKIN, BrowserVariant::All)
            .collect();
        assert_eq!(basic, vec![("src/Core/css/core.css", ".core{}\n")]);
        assert!(registry.has_css("Core", BASIC_SKIN, BrowserVariant::Ie));

        let dark: Vec<_> = registry.css_files("Core", "dark", BrowserVariant::All).collect();
        assert_eq!(dark, vec![("src/Core/skin/dark/css/skin.css", ".dark{}\n")]);
        assert_eq!(registry.css_skins("Core"), vec!["basic", "dark", "default"]);
    }

    #[test]
    fn test_missing_files_are_recorded_not_fatal() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "src/Core/Core.js", "CORE;");

        let core = ModuleSource {
            src: vec!["Core/Core.js".to_owned(), "Core/Gone.js".to_owned()],
            ..ModuleSource::default()
        };
        let skinned = ModuleSource {
            src: vec!["Skinned/skin/{skin}/config.js".to_owned()],
            ..ModuleSource::default()
        };
        let config = config_for(dir.path(), vec![("Core", core), ("Skinned", skinned)]);
        let outcome = SourceLoader::new(&config).load();

        assert_eq!(outcome.report.count(ErrorCategory::MissingFile), 2);
        assert_eq!(outcome.registry.len(), 2);
        let core = outcome.registry.get("Core").expect("Core is loaded");
        assert_eq!(core.js.len(), 1);
        assert!(outcome.registry.get("Skinned").is_some_and(|m| m.conf.is_empty()));
    }

    #[test]
    fn test_copyrights_are_joined_with_newlines() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "copyright.js", "/* (c) 2GIS */");
        write(dir.path(), "leaflet.js", "/* (c) Leaflet */");

        let mut config = config_for(dir.path(), Vec::new());
        config.copyrights = vec![PathBuf::from("copyright.js"), PathBuf::from("leaflet.js")];

        let mut report = RunReport::new();
        let copyrights = SourceLoader::new(&config).load_copyrights(&mut report);
        assert_eq!(copyrights, "/* (c) 2GIS */\n/* (c) Leaflet */\n");
        assert!(report.is_success());
    }
}
