//! Process environment for the converter and post-process scripts.
//!
//! The USD Python tools ship their own interpreter and native libraries. A
//! USD root directory laid out like
//!
//! ```text
//! <usd_root>/lib/python
//! <usd_root>/lib
//! <usd_root>/deps/{python,usdview-deps,usdview-deps-python,embree}
//! <usd_root>/../usdzconvert
//! ```
//!
//! is made visible by extending `PYTHONPATH` and `PATH` of the inherited
//! environment. Directories that do not exist are skipped.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use log::{debug, error, warn};

pub type EnvMap = BTreeMap<OsString, OsString>;

/// Snapshot of the current process environment.
pub fn inherited() -> EnvMap {
    std::env::vars_os().collect()
}

/// Environment for running USD tools from `usd_root`.
///
/// Without a root the inherited environment is returned unchanged.
pub fn converter_environment(usd_root: Option<&Path>) -> EnvMap {
    match usd_root {
        Some(root) => extend_for_usd_root(inherited(), root),
        None => inherited(),
    }
}

/// Extends `env` with the search paths of a USD root.
pub fn extend_for_usd_root(mut env: EnvMap, usd_root: &Path) -> EnvMap {
    if !usd_root.is_dir() {
        error!(
            "USD root directory {:?} does not exist, using inherited environment",
            usd_root
        );
        return env;
    }

    let deps = usd_root.join("deps");
    let lib = usd_root.join("lib");

    let mut python_paths = vec![lib.join("python"), deps.join("usdview-deps-python")];
    if let Some(parent) = usd_root.parent() {
        python_paths.push(parent.join("usdzconvert"));
    }
    let binary_paths = [
        deps.join("python"),
        lib.clone(),
        deps.join("usdview-deps"),
        deps.join("embree"),
    ];

    for dir in python_paths.iter().filter(|p| p.is_dir()) {
        append_search_path(&mut env, "PYTHONPATH", dir);
    }
    for dir in binary_paths.iter().filter(|p| p.is_dir()) {
        append_search_path(&mut env, "PATH", dir);
    }

    env
}

/// Appends `dir` to the search path variable `key`, keeping existing entries
/// first.
fn append_search_path(env: &mut EnvMap, key: &str, dir: &Path) {
    let key = existing_key(env, key).unwrap_or_else(|| OsString::from(key));
    let dir = absolute(dir);

    let mut entries: Vec<PathBuf> = env
        .get(&key)
        .map(|value| std::env::split_paths(value).collect())
        .unwrap_or_default();
    if entries.iter().any(|e| e == &dir) {
        return;
    }
    entries.push(dir.clone());

    match std::env::join_paths(entries) {
        Ok(joined) => {
            debug!("Extending {:?} with {:?}", key, dir);
            env.insert(key, joined);
        }
        Err(e) => warn!("Cannot add {:?} to {:?}: {}", dir, key, e),
    }
}

/// Windows treats variable names case-insensitively (`Path` vs `PATH`).
fn existing_key(env: &EnvMap, key: &str) -> Option<OsString> {
    if cfg!(windows) {
        env.keys()
            .find(|k| k.to_str().is_some_and(|k| k.eq_ignore_ascii_case(key)))
            .cloned()
    } else {
        env.contains_key(OsStr::new(key))
            .then(|| OsString::from(key))
    }
}

fn absolute(dir: &Path) -> PathBuf {
    std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn usd_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("USD");
        for dir in [
            "lib/python",
            "deps/python",
            "deps/embree",
            "deps/usdview-deps-python",
        ] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::create_dir_all(temp.path().join("usdzconvert")).unwrap();
        temp
    }

    fn split(env: &EnvMap, key: &str) -> Vec<PathBuf> {
        env.get(OsStr::new(key))
            .map(|v| std::env::split_paths(v).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_extends_python_and_binary_paths() {
        let temp = usd_tree();
        let root = temp.path().join("USD");
        let mut base = EnvMap::new();
        base.insert("PATH".into(), "/usr/bin".into());

        let env = extend_for_usd_root(base, &root);

        assert_eq!(
            split(&env, "PYTHONPATH"),
            vec![
                root.join("lib/python"),
                root.join("deps/usdview-deps-python"),
                temp.path().join("usdzconvert"),
            ]
        );
        assert_eq!(
            split(&env, "PATH"),
            vec![
                PathBuf::from("/usr/bin"),
                root.join("deps/python"),
                root.join("lib"),
                root.join("deps/embree"),
            ]
        );
    }

    #[test]
    fn test_missing_root_keeps_environment() {
        let mut base = EnvMap::new();
        base.insert("HOME".into(), "/home/relay".into());

        let env = extend_for_usd_root(base.clone(), Path::new("/definitely/not/here"));
        assert_eq!(env, base);
    }

    #[test]
    fn test_extending_twice_does_not_duplicate() {
        let temp = usd_tree();
        let root = temp.path().join("USD");

        let once = extend_for_usd_root(EnvMap::new(), &root);
        let twice = extend_for_usd_root(once.clone(), &root);
        assert_eq!(once, twice);
    }
}
