//! Program images
//!
//! Two on-disk forms: a raw little-endian binary of 32-bit instruction
//! words, and a plain-text listing of one hexadecimal word per line (with
//! `#` comments), handy for hand-assembled kernels.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// Read a raw binary image. The length must be a whole number of words.
pub fn read_binary(path: &Path) -> Result<Vec<u32>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::WordSize(bytes.len()));
    }
    let words = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect::<Vec<u32>>();
    info!("Loaded {} instruction words from {:?}", words.len(), path);
    Ok(words)
}

/// Read a text listing: one hex word per line, blank lines and `#`
/// comments ignored. An optional `0x` prefix is accepted.
pub fn read_listing(path: &Path) -> Result<Vec<u32>> {
    let text = fs::read_to_string(path)?;
    parse_listing(&text)
}

pub fn parse_listing(text: &str) -> Result<Vec<u32>> {
    let mut words = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let digits = line.strip_prefix("0x").unwrap_or(line);
        let word = u32::from_str_radix(digits, 16)
            .map_err(|e| Error::Parse(format!("line {}: {}", lineno + 1, e)))?;
        words.push(word);
    }
    Ok(words)
}

/// Pick the reader from the file extension: `.hex` and `.txt` are
/// listings, anything else is a raw binary.
pub fn read(path: &Path) -> Result<Vec<u32>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("hex") | Some("txt") => read_listing(path),
        _ => read_binary(path),
    }
}
