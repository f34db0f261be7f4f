//! Config root discovery and script file resolution.
//!
//! Scripts are looked up by exact file name in two places, in order:
//! `<root>/<subdir>/<name>` first, then `<root>/<name>`.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".batchexec";

/// Resolve the configuration root for a working directory.
///
/// Walks upward from `start` looking for a `.batchexec/` directory. When none
/// exists, returns `<start>/.batchexec` so new projects get a predictable
/// location.
pub fn resolve_config_root(start: &Path) -> PathBuf {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_DIR);
        if candidate.is_dir() {
            return candidate;
        }
        if !dir.pop() {
            return start.join(CONFIG_DIR);
        }
    }
}

/// Locates scripts under a config root and enumerates completion candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocator {
    root: PathBuf,
    subdir: String,
    extension: String,
}

impl ScriptLocator {
    pub fn new(root: impl Into<PathBuf>, subdir: &str, extension: &str) -> Self {
        Self {
            root: root.into(),
            subdir: subdir.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Search locations in probe order.
    pub fn search_dirs(&self) -> [PathBuf; 2] {
        [self.root.join(&self.subdir), self.root.clone()]
    }

    /// Find the first regular file named `name` in the search locations.
    ///
    /// Absence is a normal outcome, so this returns `None` rather than an
    /// error. Names with path components never resolve.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_file_name(name) {
            debug!(name = name, "rejecting script name with path components");
            return None;
        }

        let found = self
            .search_dirs()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file());
        debug!(name = name, found = ?found, "script resolution");
        found
    }

    /// Script file names available in either search location.
    ///
    /// Best effort: unreadable entries are skipped and a failed directory
    /// listing degrades to an empty set with a warning.
    pub fn list_candidates(&self) -> BTreeSet<String> {
        match self.try_list_candidates() {
            Ok(names) => names,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "script discovery failed");
                BTreeSet::new()
            }
        }
    }

    fn try_list_candidates(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for dir in self.search_dirs() {
            if !dir.is_dir() {
                continue;
            }

            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("failed to list {}", dir.display()))?;
            for entry in entries {
                let Ok(entry) = entry else {
                    continue;
                };
                let path = entry.path();
                if !path.is_file() || !self.has_script_extension(&path) {
                    continue;
                }
                match entry.file_name().to_str() {
                    Some(name) if !name.is_empty() => {
                        names.insert(name.to_string());
                    }
                    _ => {}
                }
            }
        }
        Ok(names)
    }

    fn has_script_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

/// True when `name` is a single, ordinary path component.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn locator(root: &Path) -> ScriptLocator {
        ScriptLocator::new(root, "scripts", "txt")
    }

    #[test]
    fn prefers_subdirectory_copy_when_both_exist() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        fs::write(tmp.path().join("scripts").join("a.txt"), "spawn Wolf").unwrap();
        fs::write(tmp.path().join("a.txt"), "spawn Boar").unwrap();

        let resolved = locator(tmp.path()).resolve("a.txt").unwrap();
        assert_eq!(resolved, tmp.path().join("scripts").join("a.txt"));
    }

    #[test]
    fn falls_back_to_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();

        let resolved = locator(tmp.path()).resolve("b.txt").unwrap();
        assert_eq!(resolved, tmp.path().join("b.txt"));
    }

    #[test]
    fn missing_file_resolves_to_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(locator(tmp.path()).resolve("ghost.txt").is_none());
    }

    #[test]
    fn directories_do_not_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("scripts").join("dir.txt")).unwrap();
        assert!(locator(tmp.path()).resolve("dir.txt").is_none());
    }

    #[test]
    fn names_with_path_components_do_not_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        fs::write(tmp.path().join("secret.txt"), "").unwrap();

        let locator = locator(&tmp.path().join("scripts"));
        assert!(locator.resolve("../secret.txt").is_none());
        assert!(locator.resolve("").is_none());
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name("a/b.txt"));
        assert!(is_plain_file_name("b.txt"));
    }

    #[test]
    fn candidates_are_deduplicated_across_locations() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        fs::write(tmp.path().join("scripts").join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("config.toml"), "").unwrap();

        let names = locator(tmp.path()).list_candidates();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn candidates_skip_inaccessible_entries() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        fs::write(tmp.path().join("scripts").join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("nowhere.txt"),
            tmp.path().join("broken.txt"),
        )
        .unwrap();

        let names = locator(tmp.path()).list_candidates();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a.txt"]);
    }

    #[test]
    fn candidates_match_extension_case_insensitively() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("UPPER.TXT"), "").unwrap();
        fs::write(tmp.path().join("notes.md"), "").unwrap();

        let names = ScriptLocator::new(tmp.path(), "scripts", ".txt").list_candidates();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["UPPER.TXT"]);
    }

    #[test]
    fn candidates_for_missing_root_are_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let names = locator(&tmp.path().join("absent")).list_candidates();
        assert!(names.is_empty());
    }

    #[test]
    fn config_root_walks_up_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(CONFIG_DIR)).unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve_config_root(&nested), tmp.path().join(CONFIG_DIR));
    }

    #[test]
    fn config_root_defaults_under_start() {
        let tmp = tempfile::tempdir().unwrap();
        let start = tmp.path().join("fresh");
        fs::create_dir_all(&start).unwrap();

        assert_eq!(resolve_config_root(&start), start.join(CONFIG_DIR));
    }
}
