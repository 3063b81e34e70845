// crates/pointplay-core/src/helpers/time.rs
//
// Human-readable playback positions for log lines and status output.

/// Format seconds as `MM:SS.mmm`. Negative and non-finite input clamps to 0.
///
/// ```
/// use pointplay_core::helpers::time::format_time;
/// assert_eq!(format_time(0.0),    "00:00.000");
/// assert_eq!(format_time(61.25),  "01:01.250");
/// assert_eq!(format_time(-3.0),   "00:00.000");
/// ```
pub fn format_time(secs: f64) -> String {
    let secs  = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let total = (secs * 1000.0).round() as u64;
    let m     = total / 60_000;
    let s     = (total / 1000) % 60;
    let ms    = total % 1000;
    format!("{m:02}:{s:02}.{ms:03}")
}

/// `position / duration` pair as shown by the status line, e.g.
/// `00:04.000 / 00:10.000`. Unknown duration prints as `--:--`.
///
/// ```
/// use pointplay_core::helpers::time::format_progress;
/// assert_eq!(format_progress(4.0, 10.0), "00:04.000 / 00:10.000");
/// assert_eq!(format_progress(1.0, 0.0),  "00:01.000 / --:--");
/// ```
pub fn format_progress(current: f64, duration: f64) -> String {
    if duration > 0.0 && duration.is_finite() {
        format!("{} / {}", format_time(current), format_time(duration))
    } else {
        format!("{} / --:--", format_time(current))
    }
}
