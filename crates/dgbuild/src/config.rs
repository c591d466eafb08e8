use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::combine::{Combine, prefer};
use crate::dirs::config_layers;
use crate::registry::{BrowserVariant, DEFAULT_SKIN};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Base directory every relative path in the config is resolved against
    pub root: PathBuf,

    /// Placeholder marking the skin directory inside a source path
    pub skin_var: String,

    /// Skin used by `build` when none is requested
    pub default_skin: String,

    /// Files concatenated into the copyright banner, in order
    pub copyrights: Vec<PathBuf>,

    /// Text placed after the copyrights and before the first module
    pub intro: String,

    /// Text placed after the last module
    pub outro: String,

    /// Module declarations grouped by creator
    pub source: IndexMap<String, SourceGroup>,

    /// Named module aggregates
    pub packages: IndexMap<String, Package>,

    pub output: Outputs,

    pub lint: LintConfig,

    pub minify: MinifyConfig,
}

/// Modules declared by one creator, sharing a base path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceGroup {
    /// Prefix prepended verbatim to every declared file
    pub path: String,
    pub deps: IndexMap<String, ModuleSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSource {
    /// JS files; entries containing the skin placeholder are skin configs
    pub src: Vec<String>,
    pub css: IndexMap<BrowserVariant, Vec<String>>,
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    pub description: Option<String>,
    pub modules: Vec<String>,
}

/// Source and minified destination of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub src: PathBuf,
    pub min: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub js: Artifact,
    pub css: Artifact,
}

impl Target {
    /// The conventional `js/script[.min].js` and `css/styles[.min].css` layout below `dir`
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            js: Artifact {
                src: dir.join("js").join("script.js"),
                min: dir.join("js").join("script.min.js"),
            },
            css: Artifact {
                src: dir.join("css").join("styles.css"),
                min: dir.join("css").join("styles.min.css"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outputs {
    pub custom: Target,
    pub public: Target,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            custom: Target::under("dist"),
            public: Target::under("public"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LintConfig {
    /// Maximum line length in characters; `None` disables the check
    pub max_line_length: Option<usize>,
    pub trailing_whitespace: bool,
    pub mixed_indentation: bool,
    /// Require `===`/`!==` instead of `==`/`!=`
    pub eqeqeq: bool,
    pub no_debugger: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            max_line_length: Some(120),
            trailing_whitespace: true,
            mixed_indentation: true,
            eqeqeq: true,
            no_debugger: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MinifyConfig {
    /// Keep `/*! ... */` comments in minified output
    pub keep_bang_comments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            skin_var: "{skin}".to_owned(),
            default_skin: DEFAULT_SKIN.to_owned(),
            copyrights: Vec::new(),
            intro: String::new(),
            outro: String::new(),
            source: IndexMap::new(),
            packages: IndexMap::new(),
            output: Outputs::default(),
            lint: LintConfig::default(),
            minify: MinifyConfig::default(),
        }
    }
}

impl Combine for Config {
    fn combine(self, other: Self) -> Self {
        let default = Self::default();
        Self {
            // Scalars and lists: a value still at its default never shadows a lower layer
            root: prefer(self.root, other.root, &default.root),
            skin_var: prefer(self.skin_var, other.skin_var, &default.skin_var),
            default_skin: prefer(self.default_skin, other.default_skin, &default.default_skin),
            copyrights: prefer(self.copyrights, other.copyrights, &default.copyrights),
            intro: prefer(self.intro, other.intro, &default.intro),
            outro: prefer(self.outro, other.outro, &default.outro),
            // Tables merge key by key
            source: self.source.combine(other.source),
            packages: self.packages.combine(other.packages),
            output: prefer(self.output, other.output, &default.output),
            lint: prefer(self.lint, other.lint, &default.lint),
            minify: prefer(self.minify, other.minify, &default.minify),
        }
    }
}

/// Configuration values from environment variables with DGBUILD_ prefix
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub root: Option<PathBuf>,
    pub skin_var: Option<String>,
    pub default_skin: Option<String>,
    pub copyrights: Option<Vec<PathBuf>>,
    pub keep_bang_comments: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables with DGBUILD_ prefix
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = env::var("DGBUILD_ROOT") {
            if !root.trim().is_empty() {
                config.root = Some(PathBuf::from(root.trim()));
            }
        }

        if let Ok(skin_var) = env::var("DGBUILD_SKIN_VAR") {
            if !skin_var.is_empty() {
                config.skin_var = Some(skin_var);
            }
        }

        if let Ok(skin) = env::var("DGBUILD_DEFAULT_SKIN") {
            if !skin.trim().is_empty() {
                config.default_skin = Some(skin.trim().to_owned());
            }
        }

        // DGBUILD_COPYRIGHTS - comma-separated list of banner files
        if let Ok(copyrights) = env::var("DGBUILD_COPYRIGHTS") {
            let paths: Vec<PathBuf> = copyrights
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if !paths.is_empty() {
                config.copyrights = Some(paths);
            }
        }

        if let Ok(keep) = env::var("DGBUILD_KEEP_BANG_COMMENTS") {
            config.keep_bang_comments = parse_bool(&keep);
        }

        config
    }

    /// Apply environment config to base config
    pub fn apply_to(self, mut config: Config) -> Config {
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(skin_var) = self.skin_var {
            config.skin_var = skin_var;
        }
        if let Some(default_skin) = self.default_skin {
            config.default_skin = default_skin;
        }
        if let Some(copyrights) = self.copyrights {
            config.copyrights = copyrights;
        }
        if let Some(keep) = self.keep_bang_comments {
            config.minify.keep_bang_comments = keep;
        }
        config
    }
}

/// Parse a boolean value from string, supporting various common formats
fn parse_bool(value: &str) -> Option<bool> {
    use cow_utils::CowUtils;
    match value.trim().cow_to_lowercase().as_ref() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Resolve a config-relative path against `root`
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Number of declared modules across every creator, duplicates included
    pub fn declared_module_count(&self) -> usize {
        self.source.values().map(|group| group.deps.len()).sum()
    }

    fn validate(&self) -> Result<()> {
        if self.skin_var.is_empty() {
            return Err(anyhow!("skin-var must not be empty"));
        }
        if self.default_skin.is_empty() {
            return Err(anyhow!("default-skin must not be empty"));
        }
        Ok(())
    }

    /// Load a single config file from a path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn try_load_and_combine<P: AsRef<Path>>(config: &mut Self, path: P, context: &str) -> Result<()> {
        if path.as_ref().exists() {
            log::debug!("Loading {} from: {:?}", context, path.as_ref());
            let loaded = Self::load_from_file(&path)
                .with_context(|| format!("Failed to load {} from {:?}", context, path.as_ref()))?;
            *config = loaded.combine(config.clone());
        }
        Ok(())
    }

    /// Load configuration with hierarchical precedence:
    /// 1. CLI-provided config path (highest precedence)
    /// 2. Environment variables (DGBUILD_*)
    /// 3. Project config (dgbuild.toml in current directory)
    /// 4. User config (~/.config/dgbuild/dgbuild.toml)
    /// 5. System config (/etc/dgbuild/dgbuild.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        for (layer, path) in config_layers(Path::new(".")) {
            Self::try_load_and_combine(&mut config, &path, &layer.to_string())?;
        }

        config = EnvConfig::from_env().apply_to(config);

        if let Some(cli_config_path) = cli_config_path {
            if !cli_config_path.exists() {
                return Err(anyhow!("Config file not found: {:?}", cli_config_path));
            }
            Self::try_load_and_combine(&mut config, cli_config_path, "CLI config")?;
            // A config passed on the command line is relative to its own directory
            if config.root.is_relative() {
                if let Some(parent) = cli_config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    config.root = parent.join(&config.root);
                }
            }
        }

        config.validate().context("Invalid final configuration")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
skin-var = "{skin}"
copyrights = ["src/copyright.js"]
intro = "(function (window) {\n"
outro = "}(this));\n"

[source.dg]
path = "src/"

[source.dg.deps.Core]
src = ["Core/Core.js", "Core/skin/{skin}/config.js"]
css = { all = ["Core/css/core.css"], ie = ["Core/css/core.ie.css"] }

[source.dg.deps.TileLayer]
src = ["TileLayer/TileLayer.js"]
deps = ["Core"]

[packages.base]
description = "Core only"
modules = ["Core"]

[output.custom.js]
src = "out/custom.js"
min = "out/custom.min.js"

[output.custom.css]
src = "out/custom.css"
min = "out/custom.min.css"
"#;

    #[test]
    fn test_parse_sample_config_keeps_document_order() {
        let config = Config::from_toml(SAMPLE).expect("sample config should parse");

        let modules: Vec<_> = config.source["dg"].deps.keys().cloned().collect();
        assert_eq!(modules, vec!["Core", "TileLayer"]);
        assert_eq!(config.source["dg"].path, "src/");

        let core = &config.source["dg"].deps["Core"];
        let variants: Vec<_> = core.css.keys().copied().collect();
        assert_eq!(variants, vec![BrowserVariant::All, BrowserVariant::Ie]);
        assert_eq!(config.source["dg"].deps["TileLayer"].deps, vec!["Core"]);

        assert_eq!(config.packages["base"].modules, vec!["Core"]);
        assert_eq!(config.output.custom.js.min, PathBuf::from("out/custom.min.js"));
        // Unspecified target keeps its default
        assert_eq!(config.output.public, Outputs::default().public);
        assert_eq!(config.declared_module_count(), 2);
    }

    #[test]
    fn test_unknown_browser_variant_is_rejected() {
        let toml = r#"
[source.dg.deps.Core]
css = { opera = ["core.css"] }
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_empty_skin_var_is_rejected() {
        assert!(Config::from_toml("skin-var = \"\"").is_err());
    }

    #[test]
    fn test_combine_keeps_lower_layer_values_left_at_default() {
        let user = Config {
            intro: "/* user */".to_owned(),
            default_skin: "dark".to_owned(),
            ..Config::default()
        };
        let project = Config::from_toml(SAMPLE).expect("sample config should parse");

        let merged = project.combine(user);
        assert_eq!(merged.intro, "(function (window) {\n");
        assert_eq!(merged.default_skin, "dark");
        assert_eq!(merged.copyrights, vec![PathBuf::from("src/copyright.js")]);
    }

    #[test]
    fn test_parse_bool_formats() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_config_overrides() {
        // SAFETY: serialised test, variables are removed before returning
        unsafe {
            env::set_var("DGBUILD_ROOT", "/srv/mapsapi");
            env::set_var("DGBUILD_COPYRIGHTS", "a.js, b.js,,");
            env::set_var("DGBUILD_KEEP_BANG_COMMENTS", "1");
        }

        let config = EnvConfig::from_env().apply_to(Config::default());

        unsafe {
            env::remove_var("DGBUILD_ROOT");
            env::remove_var("DGBUILD_COPYRIGHTS");
            env::remove_var("DGBUILD_KEEP_BANG_COMMENTS");
        }

        assert_eq!(config.root, PathBuf::from("/srv/mapsapi"));
        assert_eq!(
            config.copyrights,
            vec![PathBuf::from("a.js"), PathBuf::from("b.js")]
        );
        assert!(config.minify.keep_bang_comments);
        assert_eq!(config.skin_var, "{skin}");
    }
}
