//! Decoder: turns fetched bytes into text.
//!
//! Detection is statistical (chardetng), decoding never fails (invalid
//! sequences become U+FFFD), and a final pass undoes the common
//! "UTF-8 read as Windows-1252" corruption.

use anyhow::{bail, Context, Result};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use sttp_types::Decoded;
use tracing::debug;

/// Mojibake can be stacked when text went through several wrong round trips.
const MAX_REPAIR_LAYERS: usize = 3;

/// Guess the encoding of `bytes`. Inputs without any non-ASCII byte give the
/// detector nothing to work with and default to UTF-8.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if bytes.is_ascii() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Detect, decode lossily, then repair mojibake.
pub fn decode_bytes(bytes: &[u8]) -> Decoded {
    let guessed = detect_encoding(bytes);
    // A BOM overrides the guess.
    let (text, used, had_errors) = guessed.decode(bytes);
    debug!(guessed = guessed.name(), used = used.name(), had_errors, len = bytes.len(), "decoded payload");

    let (text, repaired) = match repair_mojibake(&text) {
        Some(fixed) => (fixed, true),
        None => (text.into_owned(), false),
    };
    Decoded {
        text,
        encoding: used.name(),
        had_errors,
        repaired,
    }
}

/// Undo UTF-8 text that was decoded as Windows-1252 (or Latin-1).
///
/// Returns `None` when nothing looked corrupted or no layer could be undone.
pub fn repair_mojibake(text: &str) -> Option<String> {
    let mut current: Option<String> = None;
    for _ in 0..MAX_REPAIR_LAYERS {
        let src = current.as_deref().unwrap_or(text);
        if !looks_mojibaked(src) {
            break;
        }
        match undo_layer(src) {
            Some(fixed) => current = Some(fixed),
            None => break,
        }
    }
    if let Some(fixed) = &current {
        debug!(before = text.chars().count(), after = fixed.chars().count(), "repaired mojibake");
    }
    current
}

/// A UTF-8 lead byte followed by a continuation byte, both shown as their
/// Windows-1252 characters.
fn looks_mojibaked(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if ('\u{C2}'..='\u{F4}').contains(&c) {
            if let Some(&next) = chars.peek() {
                if is_continuation_char(next) {
                    return true;
                }
            }
        }
    }
    false
}

fn is_continuation_char(c: char) -> bool {
    matches!(windows_1252_byte(c), Some(0x80..=0xBF))
}

/// The single Windows-1252 byte `c` decodes from, if any.
fn windows_1252_byte(c: char) -> Option<u8> {
    let mut buf = [0u8; 4];
    let (bytes, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
    match (unmappable, &*bytes) {
        (false, [b]) => Some(*b),
        _ => None,
    }
}

/// Undo one layer, one run of non-ASCII Windows-1252 characters at a time, so
/// correctly encoded text elsewhere does not block the repair.
fn undo_layer(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut run: Vec<u8> = Vec::new();
    let mut run_start = 0;
    let mut changed = false;

    for (i, c) in text.char_indices() {
        if !c.is_ascii() {
            if let Some(b) = windows_1252_byte(c) {
                if run.is_empty() {
                    run_start = i;
                }
                run.push(b);
                continue;
            }
        }
        changed |= flush_run(&text[run_start..i], &mut run, &mut out);
        out.push(c);
    }
    changed |= flush_run(&text[run_start..], &mut run, &mut out);
    changed.then_some(out)
}

/// Append the repaired run (or `original` when nothing merged) to `out`.
fn flush_run(original: &str, run: &mut Vec<u8>, out: &mut String) -> bool {
    if run.is_empty() {
        return false;
    }
    let fixed = reinterpret_utf8(run);
    run.clear();
    // every real repair merges multi-char sequences into one char
    if fixed.chars().count() < original.chars().count() {
        out.push_str(&fixed);
        true
    } else {
        out.push_str(original);
        false
    }
}

/// Read bytes as UTF-8, mapping bytes outside any valid sequence back to
/// their Windows-1252 characters.
fn reinterpret_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let (raw, tail) = after.split_at(e.error_len().unwrap_or(after.len()));
                out.push_str(&WINDOWS_1252.decode_without_bom_handling(raw).0);
                rest = tail;
            }
        }
    }
    out
}

/// Lowercase hex pairs separated by single spaces.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| hex::encode([*b])).collect::<Vec<_>>().join(" ")
}

/// Parse the output of [`hex_dump`] back into bytes.
pub fn decode_hex_dump(dump: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(dump.len() / 3 + 1);
    for (i, pair) in dump.split_whitespace().enumerate() {
        if pair.len() != 2 {
            bail!("hex token {i} has {} digits: {pair:?}", pair.len());
        }
        let byte = hex::decode(pair).with_context(|| format!("invalid hex token {i}: {pair:?}"))?;
        out.extend_from_slice(&byte);
    }
    Ok(out)
}
