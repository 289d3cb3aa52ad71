pub mod max_file_lines;
pub mod workspace_scan;
