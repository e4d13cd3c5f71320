use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Reads the IP list from a file, or standard input when no path is given.
///
/// One token per line, trimmed of surrounding whitespace. Order and duplicates
/// are preserved, and blank lines come through as empty strings; anything that
/// is not a real IP simply fails the lookup later.
pub fn collect_ips(path: Option<&Path>) -> Result<Vec<String>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {:?}", path))?;
            read_lines(BufReader::new(file))
        }
        None => read_lines(io::stdin().lock()),
    }
}

fn read_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut ips = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read line from input")?;
        ips.push(line.trim().to_string());
    }
    Ok(ips)
}
