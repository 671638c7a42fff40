//! `uspack which`: which packages run on a URL.

use anyhow::Result;

use crate::config::AppConfig;
use crate::log;
use crate::package::PackageRegistry;

/// Print `name<TAB>patterns` for every package whose patterns accept `url`.
pub fn which_packages(config: &AppConfig, url: &str) -> Result<()> {
    let reserved = [config.build.output_filename.clone()];
    let registry = PackageRegistry::discover_reserving(&config.build.packages, &reserved)?;

    let lines = matching_lines(&registry, url);
    if lines.is_empty() {
        log!("which"; "no package matches {}", url);
        return Ok(());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn matching_lines(registry: &PackageRegistry, url: &str) -> Vec<String> {
    registry
        .matching(url)
        .map(|p| format!("{}\t{}", p.name, p.matches.join(" ")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_matching_lines() {
        let root = TempDir::new().unwrap();
        for (name, pattern) in [("alpha", "https://a.example/*"), ("any", "*")] {
            let dir = root.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("package.json"),
                format!(r#"{{"name":"{name}","userScript":{{"matches":"{pattern}"}}}}"#),
            )
            .unwrap();
        }

        let registry = PackageRegistry::discover(root.path()).unwrap();
        assert_eq!(
            matching_lines(&registry, "https://a.example/page"),
            vec!["alpha\thttps://a.example/*", "any\t*"]
        );
        assert_eq!(matching_lines(&registry, "https://b.example/"), vec!["any\t*"]);
    }
}
