use std::path::{Path, PathBuf};

fn should_skip_directory_name(dir_name: &str) -> bool {
    matches!(
        dir_name,
        "target" | ".git" | "snapshots" | "examples" | "demos"
    )
}

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

fn is_crate_source(path: &Path) -> bool {
    path.components().any(|component| {
        let name = component.as_os_str();
        name == "src" || name == "tests"
    })
}

/// Every `.rs` file under a crate's `src/` or `tests/` directory, sorted.
pub fn list_workspace_rust_files() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(should_skip_directory_name)
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("rs"))
        .filter(|path| path.strip_prefix(&root).is_ok_and(is_crate_source))
        .collect::<Vec<_>>();
    files.sort();
    files
}
