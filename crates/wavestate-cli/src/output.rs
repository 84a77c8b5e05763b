//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use crate::commands::decode::DecodedEntry;
use crate::script::{Replay, ReplayEvent};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the result of a replay
    pub fn print_replay(&self, replay: &Replay) {
        match self.format {
            OutputFormat::Human => {
                for event in &replay.events {
                    println!("{}", describe_event(event));
                }
                if !replay.ready {
                    println!("(participants never arrived; nothing was delivered)");
                }
                println!();
                println!(
                    "{} event(s), {} live object(s), {} key(s) in final state",
                    replay.events.len(),
                    replay.objects,
                    replay.final_state.len()
                );
            }
            OutputFormat::Json => print_json(replay),
            OutputFormat::Quiet => {
                for (key, value) in &replay.final_state {
                    println!("{}\t{}", key, value);
                }
            }
        }
    }

    /// Print decoded snapshot entries
    pub fn print_decoded(&self, entries: &[DecodedEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No keys found.");
                    return;
                }
                for entry in entries {
                    let tag = entry.type_tag.as_deref().unwrap_or("-");
                    match &entry.error {
                        Some(error) => println!("{} [{}] error: {}", entry.key, tag, error),
                        None => println!("{} [{}] {} {}", entry.key, tag, entry.shape, entry.value),
                    }
                    for reference in &entry.unresolved {
                        println!("    unresolved: {}", reference);
                    }
                }
                println!("\n{} key(s)", entries.len());
            }
            OutputFormat::Json => print_json(&entries),
            OutputFormat::Quiet => {
                for entry in entries.iter().filter(|e| e.error.is_some()) {
                    println!("{}", entry.key);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// One-line description of a replay event
fn describe_event(event: &ReplayEvent) -> String {
    match event {
        ReplayEvent::Update {
            key,
            changed,
            removed,
            state,
        } => {
            let mut line = format!("update  {} {}", key, changed);
            if !removed.is_empty() {
                line.push_str(&format!(" -{}", removed.join(",-")));
            }
            format!("{} => {}", line, truncate(&state.to_string(), 60))
        }
        ReplayEvent::Remove { key } => format!("remove  {}", key),
        ReplayEvent::Participants { count } => format!("participants {}", count),
        ReplayEvent::Flushed { entries } => format!("flush   {} key(s)", entries),
        ReplayEvent::FlushFailed { error } => format!("flush   failed: {}", error),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ääääääääääää", 6), "äää...");
    }

    #[test]
    fn test_describe_events() {
        let update = ReplayEvent::Update {
            key: "k1".to_string(),
            changed: json!({"x": 1}),
            removed: vec!["y".to_string()],
            state: json!({"x": 1}),
        };
        assert_eq!(describe_event(&update), r#"update  k1 {"x":1} -y => {"x":1}"#);

        assert_eq!(
            describe_event(&ReplayEvent::Remove { key: "k1".to_string() }),
            "remove  k1"
        );
        assert_eq!(
            describe_event(&ReplayEvent::Flushed { entries: 2 }),
            "flush   2 key(s)"
        );
    }
}
