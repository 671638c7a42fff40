//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from `start`.
///
/// Returns the absolute path to the config file if found.
///
/// # Example
/// ```text
/// /home/user/scripts/src/github/   ← start
/// /home/user/scripts/uspack.toml   ← found!
/// ```
pub fn find_config_file(config_name: &Path, start: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_walks_upward() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("src/github");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("uspack.toml"), "").unwrap();

        let found = find_config_file(Path::new("uspack.toml"), &nested).unwrap();
        assert_eq!(found, dir.path().join("uspack.toml"));
    }

    #[test]
    fn test_find_config_absolute_missing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(find_config_file(&missing, dir.path()).is_none());
    }
}
