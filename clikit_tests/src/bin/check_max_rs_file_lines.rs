use std::process::ExitCode;

use clikit_tests::guards::max_file_lines::{
    MaxFileLinesGuardConfig, find_files_over_max_physical_lines, render_violations,
};

fn main() -> ExitCode {
    let cfg = MaxFileLinesGuardConfig::default();
    match find_files_over_max_physical_lines(cfg) {
        Ok(violations) if violations.is_empty() => ExitCode::SUCCESS,
        Ok(violations) => {
            eprintln!("{}", render_violations(cfg, &violations));
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("failed scanning workspace: {err}");
            ExitCode::FAILURE
        }
    }
}
