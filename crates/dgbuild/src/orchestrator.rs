use anyhow::{Context, Result};
use log::{debug, info, warn};
use rustc_hash::FxHashSet;

use crate::bundle::{CssAssembler, JsAssembler, JsFrame};
use crate::config::{Config, Target};
use crate::dependency_graph::{AuditFinding, DependencyGraph};
use crate::lint::{LintFinding, Linter, TokenLinter};
use crate::loader::SourceLoader;
use crate::minify::{Minifier, Packager, TokenMinifier};
use crate::registry::{BASIC_SKIN, DEFAULT_SKIN, ModuleRegistry};
use crate::report::{ErrorCategory, RunReport};
use crate::resolver::{ModuleResolver, Resolution};
use crate::util::{size_kb, write_artifact};

/// Specifier that selects the `public` output target
pub const PUBLIC_SPEC: &str = "public";

/// Options of a `build` run
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Package name, comma-separated module list or single module; `None` builds everything
    pub spec: Option<String>,
    /// Skin name; `None` uses the configured default skin
    pub skin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Custom,
    Public,
}

/// Sizes of one written artifact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtifactSize {
    pub source_bytes: usize,
    pub minified_bytes: usize,
    pub source_kb: f64,
    pub minified_kb: f64,
}

impl ArtifactSize {
    fn measure(source: &str, minified: &str) -> Self {
        Self {
            source_bytes: source.len(),
            minified_bytes: minified.len(),
            source_kb: size_kb(source),
            minified_kb: size_kb(minified),
        }
    }

    fn log(&self) {
        info!("   Uncompressed size: {:.1} KB", self.source_kb);
        info!("   Compressed size:   {:.1} KB", self.minified_kb);
    }
}

/// What a `build` run produced
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub target: TargetKind,
    pub skin: String,
    pub modules: Vec<String>,
    pub js: ArtifactSize,
    pub css: ArtifactSize,
    pub report: RunReport,
}

/// A lint diagnostic together with the file it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFinding {
    pub path: String,
    pub finding: LintFinding,
}

/// What a `lint` run found
#[derive(Debug, Clone, Default)]
pub struct LintSummary {
    pub findings: Vec<FileFinding>,
    pub audit: Vec<AuditFinding>,
    pub report: RunReport,
}

/// Holds the configuration and the loaded module registry between calls.
///
/// `build` and `lint` are batch entry points. `init` followed by `get_js`/`get_css` is the
/// server mode: the registry is loaded once and bundles are assembled on demand.
pub struct BuildSession {
    config: Config,
    registry: Option<ModuleRegistry>,
    copyrights: String,
    minifier: Box<dyn Minifier + Send + Sync>,
    linter: Box<dyn Linter + Send + Sync>,
}

impl BuildSession {
    pub fn new(config: Config) -> Self {
        let minifier = TokenMinifier::new(&config.minify);
        let linter = TokenLinter::new(config.lint.clone());
        Self {
            config,
            registry: None,
            copyrights: String::new(),
            minifier: Box::new(minifier),
            linter: Box::new(linter),
        }
    }

    /// Replace the built-in minifier
    pub fn with_minifier(mut self, minifier: Box<dyn Minifier + Send + Sync>) -> Self {
        self.minifier = minifier;
        self
    }

    /// Replace the built-in linter
    pub fn with_linter(mut self, linter: Box<dyn Linter + Send + Sync>) -> Self {
        self.linter = linter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> Option<&ModuleRegistry> {
        self.registry.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.registry.is_some()
    }

    /// Load the registry unless it is already loaded
    pub fn load(&mut self) -> RunReport {
        if self.is_loaded() {
            return RunReport::new();
        }
        self.reload()
    }

    /// Read every declared source again, replacing the current registry
    pub fn reload(&mut self) -> RunReport {
        let outcome = SourceLoader::new(&self.config).load();
        self.registry = Some(outcome.registry);
        outcome.report
    }

    fn refresh_copyrights(&mut self) -> RunReport {
        let mut report = RunReport::new();
        self.copyrights = SourceLoader::new(&self.config).load_copyrights(&mut report);
        report
    }

    /// Load the registry and the copyright banner for server mode
    pub fn init(&mut self) -> RunReport {
        let mut report = self.reload();
        report.merge(&self.refresh_copyrights());
        report.log_summary("Load source files");
        report
    }

    fn loaded_registry(&self) -> Result<&ModuleRegistry> {
        self.registry
            .as_ref()
            .context("Module registry is not loaded, call init() first")
    }

    /// Expand a specifier against the loaded registry
    pub fn resolve(&self, spec: Option<&str>) -> Result<Resolution> {
        let registry = self.loaded_registry()?;
        Ok(ModuleResolver::new(registry, &self.config.packages).resolve(spec))
    }

    /// Dependency audit of the loaded registry
    pub fn audit(&self) -> Result<Vec<AuditFinding>> {
        let registry = self.loaded_registry()?;
        Ok(DependencyGraph::from_registry(registry).audit(registry))
    }

    /// Lint every JS and skin-config file once, then audit the declared dependencies.
    /// Sources are always read afresh.
    pub fn lint(&mut self) -> LintSummary {
        let outcome = SourceLoader::new(&self.config).load();
        let registry = outcome.registry;
        let mut summary = LintSummary {
            report: outcome.report,
            ..LintSummary::default()
        };

        info!("Check all source JS files for errors...");

        let mut linted: FxHashSet<&str> = FxHashSet::default();
        for (_, entry) in registry.iter() {
            let files = entry
                .js
                .iter()
                .map(|(path, content)| (path.as_str(), content.as_str()))
                .chain(
                    entry
                        .conf
                        .values()
                        .map(|conf| (conf.path.as_str(), conf.content.as_str())),
                );

            for (path, content) in files {
                if !linted.insert(path) {
                    continue;
                }
                for finding in self.linter.lint(content) {
                    warn!(
                        "  {}    line {} col {}    {}",
                        path, finding.line, finding.character, finding.reason
                    );
                    summary.findings.push(FileFinding {
                        path: path.to_owned(),
                        finding,
                    });
                }
            }
        }
        debug!("Linted {} files", linted.len());

        if summary.findings.is_empty() {
            info!("Lint found no errors.");
        } else {
            warn!("Lint found {} errors.", summary.findings.len());
            summary.report.record(ErrorCategory::LintFinding);
        }

        summary.audit = DependencyGraph::from_registry(&registry).audit(&registry);
        for finding in &summary.audit {
            warn!("  {finding}");
            summary.report.record(ErrorCategory::DependencyAudit);
        }

        summary.report.log_summary("Lint");
        self.registry = Some(registry);
        summary
    }

    /// Assemble, write and compress the bundles of a spec
    pub fn build(&mut self, options: &BuildOptions) -> Result<BuildSummary> {
        let mut report = self.load();
        report.merge(&self.refresh_copyrights());

        let spec = options.spec.as_deref();
        let (kind, target) = if spec == Some(PUBLIC_SPEC) {
            info!("Build public GitHub full package!");
            (TargetKind::Public, &self.config.output.public)
        } else {
            (TargetKind::Custom, &self.config.output.custom)
        };
        let skin = options
            .skin
            .clone()
            .unwrap_or_else(|| self.config.default_skin.clone());
        info!("Skin: {skin}");

        let registry = self.loaded_registry()?;
        let resolution = ModuleResolver::new(registry, &self.config.packages).resolve(spec);
        for _ in &resolution.unknown {
            report.record(ErrorCategory::UnknownModule);
        }

        let frame = JsFrame {
            copyrights: &self.copyrights,
            intro: &self.config.intro,
            outro: &self.config.outro,
        };
        let js_src = JsAssembler::new(registry, frame).assemble(&resolution.modules, &skin);
        let css_src = CssAssembler::new(registry).assemble(&resolution.modules, &skin, true);

        self.write(target, &js_src, &css_src)?;

        info!("Compressing JS...");
        let js_min = Packager::new(self.minifier.as_ref(), &self.copyrights).package(&js_src, false);
        write_artifact(&self.config.resolve_path(&target.js.min), &js_min)?;
        let js = ArtifactSize::measure(&js_src, &js_min);
        js.log();

        info!("Compressing CSS...");
        write_artifact(&self.config.resolve_path(&target.css.min), &css_src)?;
        let css = ArtifactSize::measure(&css_src, &css_src);
        css.log();

        report.log_summary("Build");

        Ok(BuildSummary {
            target: kind,
            skin,
            modules: resolution.modules,
            js,
            css,
            report,
        })
    }

    fn write(&self, target: &Target, js: &str, css: &str) -> Result<()> {
        write_artifact(&self.config.resolve_path(&target.js.src), js)?;
        write_artifact(&self.config.resolve_path(&target.css.src), css)
    }

    /// Assemble JS for a request against the loaded registry, with the `default` skin
    pub fn get_js(
        &self,
        spec: Option<&str>,
        debug: bool,
        callback: impl FnOnce(&str),
    ) -> Result<RunReport> {
        let registry = self.loaded_registry()?;
        let mut report = RunReport::new();
        let resolution = ModuleResolver::new(registry, &self.config.packages)
            .quiet()
            .resolve(spec);
        for _ in &resolution.unknown {
            report.record(ErrorCategory::UnknownModule);
        }

        let frame = JsFrame {
            copyrights: &self.copyrights,
            intro: &self.config.intro,
            outro: &self.config.outro,
        };
        let content = JsAssembler::new(registry, frame)
            .quiet()
            .assemble(&resolution.modules, DEFAULT_SKIN);
        let packaged = Packager::new(self.minifier.as_ref(), &self.copyrights).package(&content, debug);

        callback(&packaged);
        Ok(report)
    }

    /// Assemble CSS for a request against the loaded registry: `basic` skin, no IE files,
    /// never minified whatever `debug` says
    pub fn get_css(
        &self,
        spec: Option<&str>,
        _debug: bool,
        callback: impl FnOnce(&str),
    ) -> Result<RunReport> {
        let registry = self.loaded_registry()?;
        let mut report = RunReport::new();
        let resolution = ModuleResolver::new(registry, &self.config.packages)
            .quiet()
            .resolve(spec);
        for _ in &resolution.unknown {
            report.record(ErrorCategory::UnknownModule);
        }

        let content = CssAssembler::new(registry)
            .quiet()
            .assemble(&resolution.modules, BASIC_SKIN, false);

        callback(&content);
        Ok(report)
    }
}
