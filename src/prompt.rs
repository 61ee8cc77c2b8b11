//! Line-oriented terminal prompts

use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;

/// Print `message` and read one trimmed line. Returns `None` at end of input.
pub fn ask(input: &mut dyn BufRead, message: &str) -> Result<Option<String>> {
    print!("{} {}", "?".bright_yellow(), message);
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        println!();
        return Ok(None);
    }

    Ok(Some(line.trim().to_string()))
}

/// Ask a y/n question; only `y` or `yes` counts as agreement
pub fn confirm(input: &mut dyn BufRead, message: &str) -> Result<bool> {
    let answer = ask(input, &format!("{} [y/N]: ", message))?;

    Ok(answer
        .map(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"))
        .unwrap_or(false))
}
