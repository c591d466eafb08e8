#![allow(clippy::disallowed_methods)] // insta macros use unwrap internally

use dgbuild::config::{ModuleSource, Target};
use dgbuild::orchestrator::{BuildOptions, BuildSession, TargetKind};
use dgbuild::{Config, ErrorCategory};
use pretty_assertions::assert_eq;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_root() -> PathBuf {
    let cwd = env::current_dir().expect("Failed to get current directory");
    cwd.join("tests/fixtures/maps_api")
}

/// Fixture config with both output targets redirected into `out`
fn fixture_config(out: &Path) -> Config {
    let root = fixture_root();
    let mut config =
        Config::load_from_file(root.join("dgbuild.toml")).expect("Failed to load fixture config");
    config.root = root;
    config.output.custom = Target::under(out.join("dist"));
    config.output.public = Target::under(out.join("public"));
    config
}

fn options(spec: Option<&str>, skin: Option<&str>) -> BuildOptions {
    BuildOptions {
        spec: spec.map(str::to_owned),
        skin: skin.map(str::to_owned),
    }
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path.as_ref())
        .unwrap_or_else(|err| panic!("Failed to read {:?}: {err}", path.as_ref()))
}

#[test]
fn test_build_module_with_skin() {
    let out = TempDir::new().expect("temp dir");
    let mut session = BuildSession::new(fixture_config(out.path()));

    let summary = session
        .build(&options(Some("TileLayer"), Some("dark")))
        .expect("build");

    assert!(summary.report.is_success());
    assert_eq!(summary.target, TargetKind::Custom);
    assert_eq!(summary.skin, "dark");
    assert_eq!(summary.modules, vec!["Core", "Map", "TileLayer"]);

    let dist = out.path().join("dist");
    insta::assert_snapshot!(read(dist.join("js/script.js")), @r"
    /* 2GIS Maps API */
    (function () {
    var DG = {};

    DG.Map.basic = true;
    DG.Map.skin = 'dark';
    DG.Map = function () {};

    DG.TileLayer = function () {};

    }());
    ");
    assert_eq!(
        read(dist.join("css/styles.css")),
        ".dg-core{}\n.dg-core-ie{}\n.dg-map{}\n.dg-map-dark{}\n"
    );
    assert_eq!(
        read(dist.join("js/script.min.js")),
        "/* 2GIS Maps API */\n(function(){\nvar DG={};\nDG.Map.basic=true;\nDG.Map.skin='dark';\nDG.Map=function(){};\nDG.TileLayer=function(){};\n}());"
    );
    assert_eq!(
        read(dist.join("css/styles.min.css")),
        read(dist.join("css/styles.css"))
    );
}

#[test]
fn test_build_sizes_match_written_files() {
    let out = TempDir::new().expect("temp dir");
    let mut session = BuildSession::new(fixture_config(out.path()));

    let summary = session.build(&options(None, None)).expect("build");
    let dist = out.path().join("dist");

    let js = read(dist.join("js/script.js"));
    let js_min = read(dist.join("js/script.min.js"));
    assert_eq!(summary.js.source_bytes, js.len());
    assert_eq!(summary.js.minified_bytes, js_min.len());
    assert!(summary.js.minified_bytes < summary.js.source_bytes);
    assert_eq!(summary.js.source_kb, js.len() as f64 / 1024.0);
    assert_eq!(summary.css.source_bytes, summary.css.minified_bytes);
}

#[test]
fn test_unknown_skin_falls_back_to_default() {
    let out = TempDir::new().expect("temp dir");
    let mut session = BuildSession::new(fixture_config(out.path()));

    session
        .build(&options(Some("Map"), Some("light")))
        .expect("build");

    let js = read(out.path().join("dist/js/script.js"));
    assert!(js.contains("DG.Map.basic = true;\nDG.Map.skin = 'default';\n"));
    assert!(!js.contains("'dark'"));
    assert_eq!(
        read(out.path().join("dist/css/styles.css")),
        ".dg-core{}\n.dg-core-ie{}\n.dg-map{}\n.dg-map-default{}\n"
    );
}

#[test]
fn test_public_spec_builds_everything_into_public_target() {
    let out = TempDir::new().expect("temp dir");
    let mut session = BuildSession::new(fixture_config(out.path()));

    let summary = session.build(&options(Some("public"), None)).expect("build");

    assert_eq!(summary.target, TargetKind::Public);
    assert_eq!(summary.skin, "default");
    assert_eq!(summary.modules, vec!["Core", "Map", "TileLayer"]);
    assert!(out.path().join("public/js/script.min.js").is_file());
    assert!(out.path().join("public/css/styles.min.css").is_file());
    assert!(!out.path().join("dist").exists());
}

#[test]
fn test_package_expands_its_modules() {
    let out = TempDir::new().expect("temp dir");
    let mut session = BuildSession::new(fixture_config(out.path()));

    let summary = session.build(&options(Some("base"), None)).expect("build");
    assert_eq!(summary.modules, vec!["Core", "Map", "TileLayer"]);

    // An empty package is not a package: everything is built
    let summary = session.build(&options(Some("empty"), None)).expect("build");
    assert_eq!(summary.modules, vec!["Core", "Map", "TileLayer"]);
}

#[test]
fn test_unknown_modules_are_reported_not_fatal() {
    let out = TempDir::new().expect("temp dir");
    let mut session = BuildSession::new(fixture_config(out.path()));

    let summary = session
        .build(&options(Some("Map,Ghost"), None))
        .expect("build");

    assert_eq!(summary.modules, vec!["Core", "Map"]);
    assert_eq!(summary.report.errors(), &[ErrorCategory::UnknownModule]);
    assert!(out.path().join("dist/js/script.js").is_file());
}

#[test]
fn test_missing_source_file_is_reported() {
    let out = TempDir::new().expect("temp dir");
    let mut config = fixture_config(out.path());
    if let Some(group) = config.source.get_mut("2gis") {
        group.deps.insert(
            "Broken".to_owned(),
            ModuleSource {
                src: vec!["Broken/src/Broken.js".to_owned()],
                ..ModuleSource::default()
            },
        );
    }
    let mut session = BuildSession::new(config);

    let summary = session.build(&options(Some("Broken"), None)).expect("build");

    assert!(summary.report.contains(ErrorCategory::MissingFile));
    assert_eq!(summary.modules, vec!["Broken"]);
    assert_eq!(
        read(out.path().join("dist/js/script.js")),
        "/* 2GIS Maps API */\n(function () {\n}());\n"
    );
}

#[test]
fn test_unwritable_output_is_fatal() {
    let out = TempDir::new().expect("temp dir");
    let blocker = out.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("write");

    let mut config = fixture_config(out.path());
    config.output.custom = Target::under(blocker.join("dist"));
    let mut session = BuildSession::new(config);

    assert!(session.build(&options(None, None)).is_err());
}
