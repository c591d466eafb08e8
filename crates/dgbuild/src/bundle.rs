//! Concatenation of resolved modules into JS and CSS bundles.
//!
//! Both assemblers walk the resolved list in order and emit every source file at most once
//! per bundle, at the position of its first occurrence.

use log::{debug, log};
use rustc_hash::FxHashSet;

use crate::registry::{BASIC_SKIN, BrowserVariant, ModuleRegistry, select_skin};
use crate::util::progress_level;

/// Text wrapped around the JS body
#[derive(Debug, Clone, Copy, Default)]
pub struct JsFrame<'a> {
    pub copyrights: &'a str,
    pub intro: &'a str,
    pub outro: &'a str,
}

/// Emits each key at most once
#[derive(Debug, Default)]
struct DedupGuard<'a> {
    emitted: FxHashSet<&'a str>,
}

impl<'a> DedupGuard<'a> {
    fn first_time(&mut self, key: &'a str) -> bool {
        self.emitted.insert(key)
    }
}

#[derive(Debug)]
pub struct JsAssembler<'a> {
    registry: &'a ModuleRegistry,
    frame: JsFrame<'a>,
    quiet: bool,
}

impl<'a> JsAssembler<'a> {
    pub fn new(registry: &'a ModuleRegistry, frame: JsFrame<'a>) -> Self {
        Self {
            registry,
            frame,
            quiet: false,
        }
    }

    /// Report progress at `debug` instead of `info`
    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Assemble `copyrights + intro + body + outro`.
    ///
    /// For every module, skin configs (`basic`, then the requested skin or `default`) come
    /// before the module's own files. Configs are guarded per `skin:module`, files per path.
    pub fn assemble(&self, modules: &[String], skin: &str) -> String {
        let mut loaded_files = DedupGuard::default();
        let mut loaded_configs: FxHashSet<String> = FxHashSet::default();
        let mut contributing = 0usize;
        let mut body = String::new();

        for name in modules {
            let Some(entry) = self.registry.get(name) else {
                debug!("Skipping unregistered module {name}");
                continue;
            };
            contributing += 1;

            if !entry.conf.is_empty() {
                let selected = select_skin(skin, |s| entry.conf.contains_key(s));
                let skins = [Some(BASIC_SKIN).filter(|s| entry.conf.contains_key(*s)), selected];
                for skin_name in skins.into_iter().flatten() {
                    let Some(conf) = entry.conf.get(skin_name) else {
                        continue;
                    };
                    if loaded_configs.insert(format!("{skin_name}:{name}")) {
                        body.push_str(&conf.content);
                    }
                }
            }

            for (path, content) in &entry.js {
                if loaded_files.first_time(path) {
                    body.push_str(content);
                }
            }
        }

        log!(
            progress_level(self.quiet),
            "Concatenating JS in {contributing} modules..."
        );

        let mut bundle = String::with_capacity(
            self.frame.copyrights.len() + self.frame.intro.len() + body.len() + self.frame.outro.len(),
        );
        bundle.push_str(self.frame.copyrights);
        bundle.push_str(self.frame.intro);
        bundle.push_str(&body);
        bundle.push_str(self.frame.outro);
        bundle
    }
}

#[derive(Debug)]
pub struct CssAssembler<'a> {
    registry: &'a ModuleRegistry,
    quiet: bool,
}

impl<'a> CssAssembler<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        Self {
            registry,
            quiet: false,
        }
    }

    /// Report progress at `debug` instead of `info`
    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Assemble the CSS bundle.
    ///
    /// Per module: `basic/all`, `basic/ie`, then `all` and `ie` of the requested skin (or
    /// `default`). The `ie` steps only run with `include_ie`. One path guard spans the bundle.
    pub fn assemble(&self, modules: &[String], skin: &str, include_ie: bool) -> String {
        let mut loaded_files = DedupGuard::default();
        let mut contributing = 0usize;
        let mut result = String::new();

        for name in modules {
            if !self.registry.contains(name) {
                continue;
            }

            if self.registry.has_css(name, BASIC_SKIN, BrowserVariant::All) {
                contributing += 1;
            }

            let mut steps = vec![(BASIC_SKIN, BrowserVariant::All)];
            if include_ie {
                steps.push((BASIC_SKIN, BrowserVariant::Ie));
            }
            if let Some(selected) = select_skin(skin, |s| self.registry.has_css_skin(name, s)) {
                steps.push((selected, BrowserVariant::All));
                if include_ie {
                    steps.push((selected, BrowserVariant::Ie));
                }
            }

            for (skin_name, variant) in steps {
                for (path, content) in self.registry.css_files(name, skin_name, variant) {
                    if loaded_files.first_time(path) {
                        result.push_str(content);
                    }
                }
            }
        }

        log!(
            progress_level(self.quiet),
            "Concatenating CSS in {contributing} modules..."
        );

        result
    }
}
