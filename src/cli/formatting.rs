//! Formatting utilities for traffic figures
//!
//! Consistent units for byte totals and transfer speeds across the
//! text output.

/// Formats byte counts with binary units (B, KB, MB, GB, TB)
///
/// # Examples
///
/// ```
/// use lan_watcher::cli::formatting::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1048576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit_index])
    }
}

/// Formats a speed given in KiB per second
///
/// ```
/// use lan_watcher::cli::formatting::format_kib_speed;
///
/// assert_eq!(format_kib_speed(0.5), "0.50 KB/s");
/// assert_eq!(format_kib_speed(2048.0), "2.00 MB/s");
/// ```
pub fn format_kib_speed(kib_per_sec: f64) -> String {
    if kib_per_sec < 1024.0 {
        format!("{kib_per_sec:.2} KB/s")
    } else if kib_per_sec < 1024.0 * 1024.0 {
        format!("{:.2} MB/s", kib_per_sec / 1024.0)
    } else {
        format!("{:.2} GB/s", kib_per_sec / (1024.0 * 1024.0))
    }
}

/// Shows `name` when known, the dotted address otherwise
pub fn display_name(name: &str, address: std::net::Ipv4Addr) -> String {
    if name.is_empty() {
        address.to_string()
    } else {
        name.to_string()
    }
}
