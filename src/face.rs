//! Text rendering of the watch face.

use crate::monitor::MonitorSnapshot;

/// Render a snapshot the way the watch screen lays it out, one element per
/// line.
pub fn render(snapshot: &MonitorSnapshot) -> String {
    if !snapshot.is_authorized {
        return "Please authorize\nHealth access".to_string();
    }

    let mut lines = vec![
        // Whole beats, truncated like the watch display
        format!("{}", snapshot.current_heart_rate as i64),
        "BPM".to_string(),
    ];
    if let Some(message) = snapshot.breathing_message() {
        lines.push(message.to_string());
    }
    lines.push(if snapshot.is_monitoring { "[Stop]" } else { "[Start]" }.to_string());
    lines.join("\n")
}
