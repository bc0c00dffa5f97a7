//! Host-independent encoding, signing and parsing primitives

use super::types::{ArchiveEntry, MacAlgorithm};
use crate::error::{Error, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use std::io::{Cursor, Read};

/// Standard base64 (with padding)
pub fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Compute an HMAC signature, returning the raw digest bytes
pub fn compute_hmac(algorithm: MacAlgorithm, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        MacAlgorithm::HmacSha256 => sign::<Hmac<sha2::Sha256>>(data, key),
        MacAlgorithm::HmacSha384 => sign::<Hmac<sha2::Sha384>>(data, key),
        MacAlgorithm::HmacSha512 => sign::<Hmac<sha2::Sha512>>(data, key),
        MacAlgorithm::HmacSha1 => sign::<Hmac<sha1::Sha1>>(data, key),
        MacAlgorithm::HmacMd5 => sign::<Hmac<md5::Md5>>(data, key),
    }
}

fn sign<M: Mac + hmac::digest::KeyInit>(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| Error::Other(format!("Invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Parse delimited text into rows of trimmed cells.
///
/// Blank lines are skipped. Quoted cells may contain the delimiter and use
/// `""` for a literal quote; quoted newlines are not supported.
pub fn parse_csv(text: &str, delimiter: char) -> Vec<Vec<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_csv_line(line, delimiter))
        .collect()
}

/// Parse a CSV line into fields
fn parse_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                in_quotes = true;
            }
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
    }

    fields.push(current.trim().to_string());
    fields
}

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_ENTRY_PREALLOC: u64 = 1 << 20;

/// Buffer to reserve for an entry; the declared size comes from the archive
/// and is not trusted beyond [`MAX_ENTRY_PREALLOC`]
pub(crate) fn prealloc_len(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_ENTRY_PREALLOC)).unwrap_or(0)
}

/// Extract every file in a zip archive as text
pub fn unzip(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::fetch(format!("Failed to open archive: {e}")))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| Error::fetch(format!("Failed to read archive entry {index}: {e}")))?;
        if file.is_dir() {
            continue;
        }

        let mut buf = Vec::with_capacity(prealloc_len(file.size()));
        file.read_to_end(&mut buf)?;
        entries.push(ArchiveEntry {
            name: file.name().to_string(),
            text: String::from_utf8_lossy(&buf).into_owned(),
        });
    }

    Ok(entries)
}
