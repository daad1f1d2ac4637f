//! Scripted operator console.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use warden_approval::{OperatorConsole, ProposalView};

/// One queued operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Pick a menu item by index.
    Choice(usize),
    /// Type a line.
    Text(String),
    /// Press Ctrl-C.
    CtrlC,
}

/// [`OperatorConsole`] that replays queued inputs and records what it was
/// shown.
///
/// Clones share their queues, so a test can keep a handle after giving
/// the console away. An exhausted queue reads as end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    inputs: Arc<Mutex<VecDeque<ConsoleInput>>>,
    shown: Arc<Mutex<Vec<Option<String>>>>,
    notices: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConsole {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw input.
    #[must_use]
    pub fn with_input(self, input: ConsoleInput) -> Self {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(input);
        self
    }

    /// Queue "accept".
    #[must_use]
    pub fn accept(self) -> Self {
        self.with_input(ConsoleInput::Choice(0))
    }

    /// Queue "edit" followed by `raw` as the replacement JSON.
    #[must_use]
    pub fn edit(self, raw: impl Into<String>) -> Self {
        self.with_input(ConsoleInput::Choice(1))
            .with_input(ConsoleInput::Text(raw.into()))
    }

    /// Queue "respond" followed by `text`.
    #[must_use]
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.with_input(ConsoleInput::Choice(2))
            .with_input(ConsoleInput::Text(text.into()))
    }

    /// Queue "abort".
    #[must_use]
    pub fn abort(self) -> Self {
        self.with_input(ConsoleInput::Choice(3))
    }

    /// Queue a Ctrl-C.
    #[must_use]
    pub fn ctrl_c(self) -> Self {
        self.with_input(ConsoleInput::CtrlC)
    }

    /// Tool names of the proposals shown, `None` for empty interrupts.
    #[must_use]
    pub fn shown(&self) -> Vec<Option<String>> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Notices shown.
    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Inputs not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next(&self) -> io::Result<ConsoleInput> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "console script exhausted"))
    }
}

impl OperatorConsole for ScriptedConsole {
    fn show_proposal(&self, proposal: Option<&ProposalView>) -> io::Result<()> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(proposal.map(|p| p.action.tool_name.clone()));
        Ok(())
    }

    fn select(&self, _title: &str, _items: &[&str]) -> io::Result<usize> {
        match self.next()? {
            ConsoleInput::Choice(index) => Ok(index),
            ConsoleInput::CtrlC => Err(io::Error::from(io::ErrorKind::Interrupted)),
            ConsoleInput::Text(text) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("expected a menu choice, got text {text:?}"),
            )),
        }
    }

    fn read_line(&self, _prompt: &str) -> io::Result<String> {
        match self.next()? {
            ConsoleInput::Text(text) => Ok(text),
            ConsoleInput::CtrlC => Err(io::Error::from(io::ErrorKind::Interrupted)),
            ConsoleInput::Choice(index) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("expected text, got menu choice {index}"),
            )),
        }
    }

    fn notify(&self, message: &str) -> io::Result<()> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        Ok(())
    }
}
