//! Human-readable byte sizes for log output.

/// Sizes up to this many bytes are printed as plain bytes.
const PLAIN_BYTES_LIMIT: u64 = 2048;

/// Format a byte count: `N b` up to 2 KiB, `X.Y kb` above.
///
/// # Examples
///
/// - `fmt_size(512)` -> `"512 b"`
/// - `fmt_size(10240)` -> `"10.0 kb"`
pub fn fmt_size(bytes: u64) -> String {
    if bytes <= PLAIN_BYTES_LIMIT {
        format!("{} b", bytes)
    } else {
        format!("{:.1} kb", bytes as f64 / 1024.0)
    }
}
