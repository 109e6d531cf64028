use std::path::{Path, PathBuf};

/// Returns the files directly under `dir` whose extension is one of `suffixes`,
/// sorted by file name so manifests render in a stable order.
pub fn get_files_with_suffix(dir: &Path, suffixes: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| suffixes.contains(&ext));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn picks_only_matching_suffixes_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0020-b.yml", "0010-a.yaml", "README.md", "0030-c.json"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.yaml")).unwrap();

        let files = get_files_with_suffix(dir.path(), &["yaml", "yml", "json"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0010-a.yaml", "0020-b.yml", "0030-c.json"]);
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(get_files_with_suffix(&dir.path().join("nope"), &["yaml"]).is_err());
    }
}
