//! In-memory module registry built by the loader and read by the resolver and assemblers.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved skin holding content that is shared by every skin
pub const BASIC_SKIN: &str = "basic";

/// Skin used when the requested one has no content for a module
pub const DEFAULT_SKIN: &str = "default";

/// Browser variant a CSS file is declared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserVariant {
    All,
    Ie,
}

impl BrowserVariant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Ie => "ie",
        }
    }
}

impl fmt::Display for BrowserVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skin-specific JS config injected ahead of a module's code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinConfig {
    pub path: String,
    pub content: String,
}

/// JS side of one declared module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Source path -> content, in declaration order
    pub js: IndexMap<String, String>,
    /// Skin name -> config
    pub conf: IndexMap<String, SkinConfig>,
    /// Declared dependencies, exactly as written in the config
    pub deps: Vec<String>,
}

impl ModuleEntry {
    pub fn new(deps: Vec<String>) -> Self {
        Self {
            deps,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_js(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.js.insert(path.into(), content.into());
        self
    }

    #[must_use]
    pub fn with_conf(
        mut self,
        skin: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.conf.insert(
            skin.into(),
            SkinConfig {
                path: path.into(),
                content: content.into(),
            },
        );
        self
    }
}

/// Composite key of the flat CSS table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CssKey {
    pub module: String,
    pub skin: String,
    pub variant: BrowserVariant,
    pub path: String,
}

/// Positions in the CSS table of the rows of one (module, skin), per variant
#[derive(Debug, Clone, Default)]
struct CssRows {
    all: Vec<usize>,
    ie: Vec<usize>,
}

impl CssRows {
    fn get(&self, variant: BrowserVariant) -> &[usize] {
        match variant {
            BrowserVariant::All => &self.all,
            BrowserVariant::Ie => &self.ie,
        }
    }

    fn push(&mut self, variant: BrowserVariant, row: usize) {
        match variant {
            BrowserVariant::All => self.all.push(row),
            BrowserVariant::Ie => self.ie.push(row),
        }
    }
}

/// Registry of every declared module.
///
/// Module iteration order is declaration order. CSS content lives in one table keyed by
/// [`CssKey`]; rows sharing a (module, skin, variant) prefix keep their insertion order.
/// An index from module and skin to row positions keeps lookups off the full table.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, ModuleEntry>,
    css: IndexMap<CssKey, String>,
    /// module -> skin (first-seen order) -> rows of `css`
    css_index: FxHashMap<String, IndexMap<String, CssRows>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module, returning the previous declaration if the name was taken.
    ///
    /// A replaced module keeps its original position and loses all of its CSS rows.
    pub fn insert_module(&mut self, name: impl Into<String>, entry: ModuleEntry) -> Option<ModuleEntry> {
        let name = name.into();
        let previous = self.modules.insert(name.clone(), entry);
        if previous.is_some() && self.css_index.contains_key(&name) {
            self.css.retain(|key, _| key.module != name);
            self.rebuild_css_index();
        }
        previous
    }

    /// Row positions shift when rows are removed
    fn rebuild_css_index(&mut self) {
        self.css_index.clear();
        for (row, key) in self.css.keys().enumerate() {
            Self::index_css_row(&mut self.css_index, key, row);
        }
    }

    fn index_css_row(
        index: &mut FxHashMap<String, IndexMap<String, CssRows>>,
        key: &CssKey,
        row: usize,
    ) {
        index
            .entry(key.module.clone())
            .or_default()
            .entry(key.skin.clone())
            .or_default()
            .push(key.variant, row);
    }

    /// Insert one CSS file. Re-inserting an existing key replaces its content in place.
    pub fn insert_css(
        &mut self,
        module: &str,
        skin: &str,
        variant: BrowserVariant,
        path: impl Into<String>,
        content: impl Into<String>,
    ) {
        let key = CssKey {
            module: module.to_owned(),
            skin: skin.to_owned(),
            variant,
            path: path.into(),
        };
        let (row, replaced) = self.css.insert_full(key, content.into());
        if replaced.is_none() {
            if let Some((key, _)) = self.css.get_index(row) {
                Self::index_css_row(&mut self.css_index, key, row);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleEntry)> {
        self.modules.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// CSS files of one (module, skin, variant), as `(path, content)` in insertion order
    pub fn css_files<'a>(
        &'a self,
        module: &'a str,
        skin: &'a str,
        variant: BrowserVariant,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let rows = self
            .css_index
            .get(module)
            .and_then(|skins| skins.get(skin))
            .map(|rows| rows.get(variant))
            .unwrap_or_default();
        rows.iter()
            .filter_map(move |&row| self.css.get_index(row))
            .map(|(key, content)| (key.path.as_str(), content.as_str()))
    }

    /// Whether the module declares any CSS for `skin` under `variant`
    pub fn has_css(&self, module: &str, skin: &str, variant: BrowserVariant) -> bool {
        self.css_files(module, skin, variant).next().is_some()
    }

    /// Whether the module declares any CSS for `skin`, in any variant
    pub fn has_css_skin(&self, module: &str, skin: &str) -> bool {
        self.css_index
            .get(module)
            .is_some_and(|skins| skins.contains_key(skin))
    }

    /// Skins with CSS content for a module, in first-seen order
    pub fn css_skins<'a>(&'a self, module: &'a str) -> Vec<&'a str> {
        self.css_index
            .get(module)
            .map(|skins| skins.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of rows in the CSS table
    pub fn css_len(&self) -> usize {
        self.css.len()
    }
}

/// Pick the skin whose content is used for a module.
///
/// The requested skin wins when the module has content for it; otherwise `"default"` is
/// used when present. Only one of the two is ever selected.
pub fn select_skin<'a>(requested: &'a str, has: impl Fn(&str) -> bool) -> Option<&'a str> {
    if has(requested) {
        Some(requested)
    } else if has(DEFAULT_SKIN) {
        Some(DEFAULT_SKIN)
    } else {
        None
    }
}
