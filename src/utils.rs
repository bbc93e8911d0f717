/// Encoding and decoding utilities
pub mod encoding {
    use base64::{engine::general_purpose, Engine as _};

    /// Base64 encode
    pub fn base64_encode(data: &[u8]) -> String {
        general_purpose::STANDARD.encode(data)
    }

    /// Base64 decode
    pub fn base64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(data)
    }
}

/// Time and formatting utilities
pub mod time {
    use chrono::{DateTime, Local, Utc};
    use std::time::Duration;

    /// Format duration as human readable string
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Elapsed time between two optional timestamps, if both are known.
    pub fn span(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Duration> {
        let (start, end) = (start?, end?);
        (end - start).to_std().ok()
    }

    /// Local wall-clock rendering used in result headers.
    pub fn local_stamp(at: DateTime<Utc>) -> String {
        at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Progress reporting utilities
pub mod progress {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    /// Percentage bar for one scan stage.
    pub fn create_stage_bar(label: &str) -> ProgressBar {
        let pb = ProgressBar::new(100);

        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.cyan} {prefix:<12} [{bar:25.green/bright_black}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );

        pb.set_prefix(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();

        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}
