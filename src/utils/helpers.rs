//! Utility functions shared by the bridge implementations
//!
//! Parsing of engine replies, identifier checks and the binary payload codec
//! used for scratch-file transfers.

use crate::error::{ProbeError, ProbeResult};

/// Check that `name` can be used as a variable name on the engine side.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject names the engine would not accept as variables.
pub fn validate_identifier(name: &str) -> ProbeResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ProbeError::Transfer(format!("invalid variable name '{}'", name)))
    }
}

/// Quote `text` as a Scilab string literal.
///
/// Both quote characters delimit strings in Scilab and are escaped by doubling.
pub fn scilab_string_literal(text: &str) -> String {
    let escaped = text.replace('"', "\"\"").replace('\'', "''");
    format!("\"{}\"", escaped)
}

/// Parse the element count printed by a pull command.
/// Example input: "-->\n1000000\n"
pub fn parse_element_count(output: &str) -> ProbeResult<usize> {
    output
        .lines()
        .map(|line| line.trim().trim_start_matches("-->").trim())
        .filter(|line| !line.is_empty())
        .find_map(|line| line.parse::<usize>().ok())
        .ok_or_else(|| {
            ProbeError::Transfer(format!("engine did not report an element count: {:?}", output))
        })
}

/// Encode values as consecutive little-endian f64 words.
pub fn encode_f64_le(values: &[i64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for &value in values {
        bytes.extend_from_slice(&(value as f64).to_le_bytes());
    }
    bytes
}

/// Decode a little-endian f64 payload, checking it holds exactly `expected` words.
pub fn decode_f64_le(bytes: &[u8], expected: usize) -> ProbeResult<Vec<f64>> {
    if bytes.len() != expected * 8 {
        return Err(ProbeError::Transfer(format!(
            "payload holds {} bytes, expected {} values ({} bytes)",
            bytes.len(),
            expected,
            expected * 8
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            f64::from_le_bytes(word)
        })
        .collect())
}
