pub fn red(text: &str) -> String {
    format!("\u{1b}[31m{text}\u{1b}[39m")
}

pub fn yellow(text: &str) -> String {
    format!("\u{1b}[33m{text}\u{1b}[39m")
}

pub fn green(text: &str) -> String {
    format!("\u{1b}[32m{text}\u{1b}[39m")
}
