//! Where `dgbuild.toml` files are looked up.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;

/// Directory holding `dgbuild.toml` in the user and system config locations
const CONFIG_DIR: &str = "dgbuild";

const CONFIG_FILE: &str = "dgbuild.toml";

/// A configuration file location, in increasing order of precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigLayer {
    System,
    User,
    Project,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system config",
            Self::User => "user config",
            Self::Project => "project config",
        })
    }
}

/// `XDG_CONFIG_HOME` or `$HOME/.config` on Linux and macOS, `AppData\Roaming` on Windows
pub fn user_config_dir() -> Option<PathBuf> {
    etcetera::choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir())
}

pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

pub fn project_config_file(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Candidates from an `XDG_CONFIG_DIRS` value, `/etc/xdg` when unset or empty
#[cfg(not(windows))]
fn xdg_candidates(value: Option<&str>) -> impl Iterator<Item = PathBuf> + '_ {
    value
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or("/etc/xdg")
        .split(':')
        .take_while(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(CONFIG_DIR).join(CONFIG_FILE))
}

/// First existing system config: the XDG config dirs, then `/etc/dgbuild/dgbuild.toml`.
/// On Windows, `%SYSTEMDRIVE%\ProgramData\dgbuild\dgbuild.toml`.
pub fn system_config_file() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        let drive = env::var_os("SYSTEMDRIVE")?;
        let candidate = program_data_candidate(Path::new(&drive));
        candidate.is_file().then_some(candidate)
    }

    #[cfg(not(windows))]
    {
        let xdg_config_dirs = env::var("XDG_CONFIG_DIRS").ok();
        xdg_candidates(xdg_config_dirs.as_deref())
            .chain(std::iter::once(
                Path::new("/etc").join(CONFIG_DIR).join(CONFIG_FILE),
            ))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(windows)]
fn program_data_candidate(system_drive: &Path) -> PathBuf {
    system_drive
        .join("ProgramData")
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Every config file location that may apply to a build rooted at `project_root`, lowest
/// precedence first. Files are not checked for existence except in the system search.
pub fn config_layers(project_root: &Path) -> Vec<(ConfigLayer, PathBuf)> {
    let mut layers = Vec::with_capacity(3);
    if let Some(path) = system_config_file() {
        layers.push((ConfigLayer::System, path));
    }
    if let Some(path) = user_config_file() {
        layers.push((ConfigLayer::User, path));
    }
    layers.push((ConfigLayer::Project, project_config_file(project_root)));
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    #[cfg(not(windows))]
    fn test_xdg_candidates() {
        let default: Vec<_> = xdg_candidates(None).collect();
        assert_eq!(default, vec![PathBuf::from("/etc/xdg/dgbuild/dgbuild.toml")]);
        assert_eq!(xdg_candidates(Some("")).count(), 1);
        assert_eq!(xdg_candidates(Some(":")).count(), 0);

        let dirs: Vec<_> = xdg_candidates(Some("/opt/a:/opt/b")).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/opt/a/dgbuild/dgbuild.toml"),
                PathBuf::from("/opt/b/dgbuild/dgbuild.toml"),
            ]
        );
    }

    #[test]
    #[cfg(windows)]
    fn test_program_data_candidate() {
        assert_eq!(
            program_data_candidate(Path::new("C:\\")),
            Path::new("C:\\ProgramData\\dgbuild\\dgbuild.toml")
        );
    }

    #[test]
    fn test_project_layer_comes_last() {
        let root = Path::new("mapsapi");
        let layers = config_layers(root);

        let (layer, path) = layers.last().expect("project layer");
        assert_eq!(*layer, ConfigLayer::Project);
        assert_eq!(path, &root.join("dgbuild.toml"));
        assert!(layers.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }
}
