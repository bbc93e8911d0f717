use crate::lifecycle::ScanState;
use crate::profile::{stage_label, ScanProfile};
use crate::progress::ProgressMap;
use crate::types::ResultRecord;
use crate::utils::{progress, time};
use colored::*;
use indicatif::{MultiProgress, ProgressBar};
use std::collections::HashMap;

const MAX_CELL_WIDTH: usize = 48;

/// Colored terminal output for scan status and results
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        let use_colors = std::env::var("NO_COLOR").is_err()
            && std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet_mode
    }

    /// Print a clean section header
    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.chars().count()));
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }

    /// Scan message line, colored as an error when it reads like one.
    pub fn print_scan_message(&self, message: &str) {
        if message.to_lowercase().contains("error") {
            self.print_error(message);
        } else {
            self.print_success(message);
        }
    }

    /// Print the results of a finished scan using the profile's columns.
    pub fn print_results(&self, profile: &ScanProfile, results: &[ResultRecord]) {
        if results.is_empty() {
            self.print_info(&format!("No {} reported", profile.result_noun));
            return;
        }

        if profile.columns.is_empty() {
            for record in results {
                self.print_key_values(record);
            }
        } else {
            self.print_table(profile.columns, results);
        }
    }

    fn print_table(&self, columns: &[&str], results: &[ResultRecord]) {
        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.field(c).replace('\n', " ").truncate_with_ellipsis(MAX_CELL_WIDTH))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                rows.iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(c.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c.to_uppercase(), width = *w))
            .collect();
        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();

        if self.use_colors {
            println!("  {}", header.join(" │ ").bright_white().bold());
            println!("  {}", rule.join("─┼─").bright_black());
        } else {
            println!("  {}", header.join(" | "));
            println!("  {}", rule.join("-+-"));
        }

        let severity_col = columns.iter().position(|c| *c == "risk" || *c == "priority");
        for row in rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, (cell, w))| {
                    let padded = format!("{:<width$}", cell, width = *w);
                    if self.use_colors && Some(i) == severity_col {
                        padded.color(severity_color(cell)).bold().to_string()
                    } else {
                        padded
                    }
                })
                .collect();
            let sep = if self.use_colors { " │ " } else { " | " };
            println!("  {}", cells.join(sep));
        }
        println!();
    }

    /// Key/value listing for single-object results (SSL, domain lookups).
    pub fn print_key_values(&self, record: &ResultRecord) {
        let entries: Vec<(String, String)> = record
            .entries()
            .into_iter()
            // The embedded report is binary noise on a terminal.
            .filter(|(k, _)| k != "pdf_base64")
            .collect();
        let width = entries.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);

        for (key, value) in entries {
            if self.use_colors {
                println!(
                    "  {} {}",
                    format!("{:<width$}", key, width = width).bright_white().bold(),
                    value.cyan()
                );
            } else {
                println!("  {:<width$} {}", key, value, width = width);
            }
        }
        println!();
    }

    /// Closing summary for a finished, failed, or stopped scan.
    pub fn print_scan_summary(&self, profile: &ScanProfile, state: &ScanState) {
        if self.quiet_mode { return; }

        self.print_section_header(&format!("📊 {} SUMMARY", profile.title.to_uppercase()));
        if let Some(target) = state.request.as_ref().map(|r| r.target.trim()) {
            println!("  🎯 Target:   {}", target);
        }
        if let Some(id) = &state.scan_id {
            println!("  🔖 Scan ID:  {}", id);
        }
        if let Some(at) = state.finished_at {
            println!("  🕒 Ended:    {}", time::local_stamp(at));
        }
        if let Some(elapsed) = time::span(state.started_at, state.finished_at) {
            println!("  ⏱  Duration: {}", time::format_duration(elapsed));
        }
        println!();
    }

    /// Print a clean banner with enhanced styling
    pub fn print_banner(&self, title: &str, subtitle: Option<&str>) {
        if self.quiet_mode { return; }

        let width = title.chars().count();
        if self.use_colors {
            println!();
            println!("  {}", "┌─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┐");
            println!("  {} {} {}",
                "│".bright_cyan(),
                title.bright_white().bold(),
                "│".bright_cyan()
            );
            if let Some(sub) = subtitle {
                println!("  {} {} {}",
                    "│".bright_cyan(),
                    format!("{:^width$}", sub, width = width).bright_black(),
                    "│".bright_cyan()
                );
            }
            println!("  {}", "└─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┘");
            println!();
        } else {
            let border = "=".repeat(width + 4);
            println!("\n{}", border);
            println!("  {}  ", title);
            if let Some(sub) = subtitle {
                println!("  {}  ", sub);
            }
            println!("{}\n", border);
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One progress bar per scan stage, created as stages first appear.
pub struct StageBars {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    hidden: bool,
}

impl StageBars {
    pub fn new(hidden: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            hidden,
        }
    }

    pub fn update(&mut self, map: &ProgressMap) {
        if self.hidden { return; }

        for (stage, pct) in map.iter() {
            let bar = self
                .bars
                .entry(stage.to_string())
                .or_insert_with(|| self.multi.add(progress::create_stage_bar(stage_label(stage))));
            bar.set_position(pct as u64);
            if pct >= 100 {
                bar.set_message("done");
            }
        }
    }

    /// Print a line without tearing the bars.
    pub fn println(&self, line: &str) {
        if self.hidden || self.bars.is_empty() {
            println!("{}", line);
        } else {
            let _ = self.multi.println(line);
        }
    }

    pub fn finish(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
    }
}

fn severity_color(value: &str) -> Color {
    match value.to_lowercase().as_str() {
        "critical" => Color::BrightRed,
        "high" => Color::Red,
        "medium" => Color::Yellow,
        "low" => Color::Green,
        _ => Color::Blue,
    }
}

/// String extension trait for better output formatting
trait StringExt {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String;
}

impl StringExt for str {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String {
        if self.chars().count() <= max_len {
            self.to_string()
        } else {
            let kept: String = self.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!("short".truncate_with_ellipsis(10), "short");
        assert_eq!("abcdefghij".truncate_with_ellipsis(6), "abc...");
        assert_eq!("ééééééé".truncate_with_ellipsis(5), "éé...");
    }

    #[test]
    fn test_severity_color() {
        assert_eq!(severity_color("High"), Color::Red);
        assert_eq!(severity_color("Informational"), Color::Blue);
    }
}
