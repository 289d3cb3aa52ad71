use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use super::workspace_scan::list_workspace_rust_files;

pub const DEFAULT_MAX_PHYSICAL_LINES: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct MaxFileLinesGuardConfig {
    pub max_physical_lines: usize,
}

impl Default for MaxFileLinesGuardConfig {
    fn default() -> Self {
        Self {
            max_physical_lines: DEFAULT_MAX_PHYSICAL_LINES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLineViolation {
    pub file_path: PathBuf,
    pub physical_lines: usize,
}

fn count_physical_lines(path: &Path) -> std::io::Result<usize> {
    let bytes = std::fs::read(path)?;
    let newlines = bytes.iter().filter(|byte| **byte == b'\n').count();
    let unterminated_tail = usize::from(bytes.last().is_some_and(|byte| *byte != b'\n'));
    Ok(newlines + unterminated_tail)
}

pub fn find_files_over_max_physical_lines(
    cfg: MaxFileLinesGuardConfig,
) -> std::io::Result<Vec<FileLineViolation>> {
    let mut violations = Vec::new();
    for file_path in list_workspace_rust_files() {
        let physical_lines = count_physical_lines(&file_path)?;
        if physical_lines > cfg.max_physical_lines {
            violations.push(FileLineViolation {
                file_path,
                physical_lines,
            });
        }
    }
    violations.sort_by(|left, right| {
        (Reverse(left.physical_lines), &left.file_path)
            .cmp(&(Reverse(right.physical_lines), &right.file_path))
    });
    Ok(violations)
}

pub fn render_violations(cfg: MaxFileLinesGuardConfig, violations: &[FileLineViolation]) -> String {
    let lines = violations
        .iter()
        .map(|violation| {
            format!(
                "{} lines -> {}",
                violation.physical_lines,
                violation.file_path.display()
            )
        })
        .collect::<Vec<_>>();
    format!(
        "found {} files over limit ({}):\n{}",
        lines.len(),
        cfg.max_physical_lines,
        lines.join("\n")
    )
}
