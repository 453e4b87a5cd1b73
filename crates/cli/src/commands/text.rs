//! `recall estimate` and `recall truncate`.

use anyhow::{Context, Result};
use recall_context::{estimate_tokens, truncate_to_tokens};
use std::io::Read;
use std::path::PathBuf;

pub fn estimate(text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let text = read_input(text, file)?;
    println!("{}", estimate_tokens(&text));
    Ok(())
}

pub fn truncate(max: usize, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let text = read_input(text, file)?;
    println!("{}", truncate_to_tokens(&text, max));
    Ok(())
}

/// Text from the positional argument, then `--file`, then stdin.
pub(crate) fn read_input(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}
