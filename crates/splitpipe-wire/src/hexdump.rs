use std::fmt::Write as _;

/// Lowercase hex rendering with a space every eight bytes.
///
/// Used for session ids, checksum mismatches and unknown-frame payloads in
/// operator-facing diagnostics.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + bytes.len() / 8);
    for (n, byte) in bytes.iter().enumerate() {
        if n > 0 && n % 8 == 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}
