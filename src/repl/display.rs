//! Display manager for REPL terminal UI
//!
//! Spinner while an exchange is in flight, formatted answers and errors.

use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

use crate::errors::RagError;
use crate::rag::Answer;

/// Prefix of the one user-visible message for a failed exchange
pub const ERROR_PREFIX: &str = "⚠️ 시스템 오류 발생";

/// Display manager for REPL UI
pub struct DisplayManager {
    current_bar: Option<ProgressBar>,
    update_interval: Duration,
    show_progress: bool,
}

impl DisplayManager {
    /// Create new display manager
    ///
    /// Spinner ticks at 10 FPS (100ms interval)
    pub fn new() -> Self {
        DisplayManager {
            current_bar: None,
            update_interval: Duration::from_millis(100),
            show_progress: true,
        }
    }

    /// Display manager that never draws spinners
    pub fn quiet() -> Self {
        DisplayManager {
            show_progress: false,
            ..Self::new()
        }
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, model: &str, index: &str) {
        let width = 64;
        let top = format!("{}", "=".repeat(width).cyan());
        let title = format!("  ragbuddy {} - Document-Grounded Technical Advisor", version);
        let info = format!("  Model: {} | Index: {} | Mode: Chat", model, index);
        let bottom = format!("{}", "=".repeat(width).cyan());

        println!("\n{}", top);
        println!("{}", title.bold().cyan());
        println!("{}", info.dimmed());
        println!("{}\n", bottom);
        println!(
            "Type your question (or {} for commands, {} to quit, {} to cancel an answer)\n",
            "/help".green(),
            "/exit".green(),
            "Ctrl-C".green()
        );
    }

    /// Start the spinner for an in-flight exchange
    pub fn start_exchange(&mut self, message: &str) {
        self.finish_current();
        if !self.show_progress {
            return;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(self.update_interval);
        self.current_bar = Some(pb);
    }

    /// Stop and clear the spinner
    pub fn finish_current(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a finished answer
    pub fn show_answer(&mut self, answer: &Answer, show_details: bool) {
        self.finish_current();
        println!("\n{}\n", answer.text);

        if show_details {
            let model = answer.model.as_deref().unwrap_or("none");
            println!(
                "{}",
                format!(
                    "model: {} | passages: {} | sources: {}",
                    model,
                    answer.match_count,
                    answer.citations.len()
                )
                .dimmed()
            );
            println!();
        }
    }

    /// Print the single message for a failed exchange
    pub fn show_exchange_error(&mut self, error: &RagError) {
        self.finish_current();
        match error {
            RagError::Cancelled { .. } => println!("{}", "Answer cancelled.".yellow()),
            other => println!("{}", format_exchange_error(other).red()),
        }
    }

    /// Display error message
    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    /// Display warning message
    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    /// Clear screen
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Hint appended when an upstream service failed
pub const RETRY_HINT: &str = "잠시 후 다시 시도해 주세요.";

/// User-visible text for a failed exchange.
///
/// Upstream failures are transient from the user's side and get a retry
/// hint; anything else needs a configuration change first.
pub fn format_exchange_error(error: &RagError) -> String {
    if error.is_upstream() {
        format!("{}: {}\n{}", ERROR_PREFIX, error, RETRY_HINT)
    } else {
        format!("{}: {}", ERROR_PREFIX, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_manager_creation() {
        let manager = DisplayManager::new();
        assert!(manager.current_bar.is_none());
        assert_eq!(manager.update_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_exchange_spinner_lifecycle() {
        let mut manager = DisplayManager::new();
        manager.start_exchange("검색 중");
        assert!(manager.current_bar.is_some());

        manager.finish_current();
        assert!(manager.current_bar.is_none());
    }

    #[test]
    fn test_quiet_never_spins() {
        let mut manager = DisplayManager::quiet();
        manager.start_exchange("working");
        assert!(manager.current_bar.is_none());
    }

    #[test]
    fn test_show_answer_clears_spinner() {
        let mut manager = DisplayManager::new();
        manager.start_exchange("working");
        manager.show_answer(
            &Answer {
                text: "answer".into(),
                citations: vec![],
                model: Some("gemini-2.5-flash".into()),
                match_count: 0,
            },
            true,
        );
        assert!(manager.current_bar.is_none());
    }

    #[test]
    fn test_format_exchange_error() {
        let text = format_exchange_error(&RagError::RetrievalUnavailable("HTTP 503".into()));
        assert!(text.starts_with(ERROR_PREFIX));
        assert!(text.contains("HTTP 503"));
        assert!(text.ends_with(RETRY_HINT));
    }

    #[test]
    fn test_local_error_has_no_retry_hint() {
        let text = format_exchange_error(&RagError::DimensionMismatch {
            expected: 3072,
            actual: 768,
        });
        assert!(text.starts_with(ERROR_PREFIX));
        assert!(!text.contains(RETRY_HINT));
    }
}
