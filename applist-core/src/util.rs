//! Small formatting helpers.

/// Format a byte count with fractional KB/MB (e.g., "1.5 KB", "2.3 MB").
pub fn format_bytes_approx(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Hide all but the first two characters of a secret.
pub fn mask_secret(s: &str) -> String {
    match s.char_indices().nth(2) {
        Some((cut, _)) => format!("{}****", &s[..cut]),
        None => "****".to_string(),
    }
}
