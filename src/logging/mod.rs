//! Logging and output control
//!
//! This module provides the [`Logger`] used for every user-visible message. A
//! logger is a plain value handed to each component that needs to report
//! something, so nothing in the crate writes to stdout behind the caller's back.
//! Quiet loggers are what the tests inject.

use std::time::{Duration, Instant};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
    scope: Option<String>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
            scope: None,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
            scope: None,
        }
    }

    /// Logger whose messages are prefixed with the given scope, e.g. `worker-3`
    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..self.clone()
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{}📝 {}", self.prefix(), message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}ℹ️  {}", self.prefix(), message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{}✅ {}", self.prefix(), message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{}⚠️  WARNING: {}", self.prefix(), message);
        }
    }

    /// Error message
    pub fn error(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}❌ ERROR: {}", self.prefix(), message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{}   {}", self.prefix(), message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            for (key, value) in items {
                println!("  {}: {}", key, value);
            }
        }
    }

    // Structured list output
    pub fn list(&self, title: &str, items: &[String]) {
        if !self.quiet {
            self.subsection(title);
            for item in items {
                println!("    {}", item);
            }

            if items.is_empty() {
                println!("  (No items to display)");
            }
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.1}s", duration.as_secs_f64())
        } else if secs < 3600 {
            format!("{}m{:02}s", secs / 60, secs % 60)
        } else {
            format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    fn prefix(&self) -> String {
        let timestamp = match (self.verbose, self.start_time) {
            (true, Some(start)) => format!("[{:8.3}s] ", start.elapsed().as_secs_f64()),
            _ => String::new(),
        };

        match &self.scope {
            Some(scope) => format!("{}[{}] ", timestamp, scope),
            None => timestamp,
        }
    }
}
