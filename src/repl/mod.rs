//! REPL (Read-Eval-Print Loop) module for interactive chat
//!
//! One session per REPL: follow-up questions see the conversation so far.
//! Input is blocked while an answer is being produced, and Ctrl-C during
//! that time cancels the exchange instead of exiting.

pub mod commands;
pub mod display;
pub mod input;

use colored::*;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::Result;
use crate::rag::{Answer, RAGPipeline};
use crate::repl::commands::{is_command, CommandHandler};
pub use crate::repl::display::DisplayManager;
use crate::repl::input::{InputEvent, InputHandler};
use crate::session::SessionState;

/// REPL session coordinator
///
/// Manages the interactive read-eval-print loop with:
/// - Input handling (rustyline)
/// - Command processing
/// - Conversation state
/// - Display coordination
pub struct ReplSession {
    input_handler: InputHandler,
    command_handler: CommandHandler,
    display_manager: DisplayManager,
    session: SessionState,
}

impl ReplSession {
    /// Create new REPL session
    pub fn new() -> Result<Self> {
        Ok(ReplSession {
            input_handler: InputHandler::new()?,
            command_handler: CommandHandler::new(),
            display_manager: DisplayManager::new(),
            session: SessionState::new(),
        })
    }

    /// Create REPL session with persistent input history
    pub fn with_history(history_path: PathBuf) -> Result<Self> {
        Ok(ReplSession {
            input_handler: InputHandler::with_history(history_path)?,
            command_handler: CommandHandler::new(),
            display_manager: DisplayManager::new(),
            session: SessionState::new(),
        })
    }

    /// Show welcome banner
    pub fn show_welcome(&self, version: &str, model: &str, index: &str) {
        self.display_manager.show_banner(version, model, index);
    }

    /// Read and answer until `/exit` or Ctrl-D
    pub async fn run(&mut self, pipeline: &RAGPipeline) -> Result<()> {
        loop {
            match self.input_handler.read_line()? {
                InputEvent::Eof => {
                    println!("{}", "Goodbye!".green());
                    break;
                }
                InputEvent::Interrupted => {
                    println!("{}", "(Ctrl-D or /exit to quit)".dimmed());
                }
                InputEvent::Line(line) => {
                    if !self.handle_input(pipeline, &line).await? {
                        break;
                    }
                }
            }
        }

        self.save()
    }

    /// Handle one line: command or question.
    ///
    /// Returns true if session should continue, false to exit
    pub async fn handle_input(&mut self, pipeline: &RAGPipeline, input: &str) -> Result<bool> {
        if input.trim().is_empty() {
            return Ok(true);
        }

        if is_command(input) {
            return self.handle_command(input);
        }

        self.ask(pipeline, input).await;
        Ok(true)
    }

    /// Parse and execute a `/` command
    pub fn handle_command(&mut self, input: &str) -> Result<bool> {
        let command = self.command_handler.parse(input);
        debug!(?command, "repl command");
        self.command_handler
            .execute(command, &mut self.session, &self.display_manager)
    }

    /// Run one exchange, cancellable with Ctrl-C.
    ///
    /// Failures are shown to the user and leave the REPL running.
    pub async fn ask(&mut self, pipeline: &RAGPipeline, query: &str) -> Option<Answer> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        self.display_manager.start_exchange("문서 검색 및 답변 생성 중");
        let outcome = pipeline.ask(&mut self.session, query, &cancel).await;
        watcher.abort();

        match outcome {
            Ok(answer) => {
                self.display_manager
                    .show_answer(&answer, self.command_handler.is_verbose());
                Some(answer)
            }
            Err(e) => {
                self.display_manager.show_exchange_error(&e);
                None
            }
        }
    }

    /// Conversation state (immutable)
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Conversation state (mutable)
    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Get display manager
    pub fn display(&self) -> &DisplayManager {
        &self.display_manager
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.command_handler.is_verbose()
    }

    /// Set verbose mode
    pub fn set_verbose(&mut self, enable: bool) {
        self.command_handler.set_verbose(enable);
    }

    /// Save input history
    pub fn save(&mut self) -> Result<()> {
        self.input_handler.save_history()
    }
}
