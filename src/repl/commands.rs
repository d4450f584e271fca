//! Command handler for REPL built-in commands
//!
//! Commands act on the session only; questions go to the pipeline.

use colored::*;
use std::path::PathBuf;

use crate::errors::Result;
use crate::repl::display::DisplayManager;
use crate::session::{Role, SessionState};
use crate::upload::UploadContext;

/// REPL command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History { limit: Option<usize> },
    Upload { path: Option<PathBuf> },
    Detach,
    Status,
    Reset,
    Exit,
    Clear,
    Unknown { input: String },
}

/// Command handler for parsing and executing REPL commands
pub struct CommandHandler {
    verbose: bool,
}

impl CommandHandler {
    /// Create new command handler
    pub fn new() -> Self {
        CommandHandler { verbose: false }
    }

    /// Parse input string into a command
    pub fn parse(&self, input: &str) -> Command {
        let trimmed = input.trim();

        let Some(body) = trimmed.strip_prefix('/') else {
            return Command::Unknown {
                input: input.to_string(),
            };
        };

        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        match name.to_lowercase().as_str() {
            "help" | "h" => Command::Help,
            "exit" | "quit" | "q" => Command::Exit,
            "history" => Command::History {
                limit: rest.parse().ok(),
            },
            "upload" | "attach" => Command::Upload {
                path: (!rest.is_empty()).then(|| PathBuf::from(rest)),
            },
            "detach" => Command::Detach,
            "status" => Command::Status,
            "reset" => Command::Reset,
            "clear" | "cls" => Command::Clear,
            _ => Command::Unknown {
                input: input.to_string(),
            },
        }
    }

    /// Execute a command
    ///
    /// Returns true if REPL should continue, false if should exit
    pub fn execute(
        &mut self,
        command: Command,
        session: &mut SessionState,
        display: &DisplayManager,
    ) -> Result<bool> {
        match command {
            Command::Help => {
                self.show_help();
                Ok(true)
            }
            Command::Exit => {
                println!("{}", "Goodbye!".green());
                Ok(false)
            }
            Command::History { limit } => {
                self.show_history(session, limit.unwrap_or(10));
                Ok(true)
            }
            Command::Upload { path: Some(path) } => {
                match UploadContext::from_path(&path) {
                    Ok(upload) => {
                        println!(
                            "{} {}",
                            "Attached:".green(),
                            upload.file_name().bold()
                        );
                        if self.verbose {
                            println!("{}", upload.summary().dimmed());
                        }
                        session.attach(upload);
                    }
                    Err(e) => display.show_error(&format!("{}: {}", path.display(), e)),
                }
                Ok(true)
            }
            Command::Upload { path: None } => {
                display.show_warning("Usage: /upload <path>");
                Ok(true)
            }
            Command::Detach => {
                match session.detach() {
                    Some(upload) => println!("{} {}", "Detached:".yellow(), upload.file_name()),
                    None => println!("{}", "No file attached.".yellow()),
                }
                Ok(true)
            }
            Command::Status => {
                self.show_status(session);
                Ok(true)
            }
            Command::Reset => {
                *session = SessionState::new();
                println!("{}", "Session reset. Conversation cleared.".yellow());
                Ok(true)
            }
            Command::Clear => {
                display.clear_screen()?;
                Ok(true)
            }
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
                Ok(true)
            }
        }
    }

    /// Display help information
    fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let commands = vec![
            ("/help, /h", "Show this help message"),
            ("/history [n]", "Show last n turns (default: 10)"),
            ("/upload <path>", "Attach a csv, xlsx, xls or image file"),
            ("/detach", "Remove the attached file"),
            ("/status", "Show session status"),
            ("/reset", "End this conversation and start a new one"),
            ("/clear, /cls", "Clear screen"),
            ("/exit, /quit, /q", "Exit"),
        ];

        for (cmd, desc) in commands {
            println!("  {:<20} {}", cmd.green(), desc);
        }

        println!("\n{}", "Usage:".bold());
        println!("  - Type your question directly (no / prefix)");
        println!("  - Follow-up questions keep the conversation context");
        println!("  - Press {} during an answer to cancel it", "Ctrl-C".cyan());
        println!("  - Press {} or {} to exit", "Ctrl-D".cyan(), "/exit".cyan());
        println!();
    }

    /// Display conversation turns, newest first
    fn show_history(&self, session: &SessionState, limit: usize) {
        let turns = session.log().recent(limit);

        if turns.is_empty() {
            println!("{}", "No conversation yet.".yellow());
            return;
        }

        println!("\n{}", format!("Conversation (last {}):", turns.len()).bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        for turn in turns {
            let who = match turn.role() {
                Role::User => "you".green(),
                Role::Assistant => "advisor".cyan(),
            };
            let time = turn.created_at().format("%H:%M:%S").to_string();
            println!("  {} {} {}", time.dimmed(), who.bold(), preview(turn.text(), 100));
        }
        println!();
    }

    /// Display session status
    fn show_status(&self, session: &SessionState) {
        println!("\n{}", "Session Status:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let duration = session.duration_secs();
        let hours = duration / 3600;
        let minutes = (duration % 3600) / 60;
        let seconds = duration % 60;

        let duration_str = if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        };

        let attached = session
            .upload()
            .map(|u| u.file_name().green())
            .unwrap_or_else(|| "None".red());

        println!("  Session:          {}", session.id().to_string().dimmed());
        println!("  Exchanges:        {}", session.exchange_count().to_string().green());
        println!("  Failed:           {}", session.failure_count().to_string().green());
        println!("  Turns:            {}", session.log().len().to_string().green());
        println!("  Attached File:    {}", attached);
        println!("  Session Duration: {}", duration_str.green());
        println!();
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode
    pub fn set_verbose(&mut self, enable: bool) {
        self.verbose = enable;
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if input is a command (starts with /)
pub fn is_command(input: &str) -> bool {
    input.trim().starts_with('/')
}

/// First line of `text`, cut to `max` characters
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        format!("{}…", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}
