//! User-facing diagnostic channel.
//!
//! The IDE shows process failures and rejected commands in a console window.
//! Components write there through [`Console`] rather than printing directly,
//! so an embedding can route messages wherever it wants.

use std::cell::RefCell;

/// Severity of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageMode {
    Text,
    Error,
}

/// Sink for messages meant for the user.
pub trait Console {
    fn write(&self, text: &str, mode: MessageMode);

    fn text(&self, text: &str) {
        self.write(text, MessageMode::Text);
    }

    fn error(&self, text: &str) {
        self.write(text, MessageMode::Error);
    }
}

/// Forwards console messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn write(&self, text: &str, mode: MessageMode) {
        let text = text.trim_end();
        match mode {
            MessageMode::Text => tracing::info!(target: "console", "{text}"),
            MessageMode::Error => tracing::error!(target: "console", "{text}"),
        }
    }
}

/// Keeps every message in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryConsole {
    messages: RefCell<Vec<(MessageMode, String)>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all messages written so far.
    pub fn messages(&self) -> Vec<(MessageMode, String)> {
        self.messages.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|(mode, _)| *mode == MessageMode::Error)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|(_, t)| t.contains(needle))
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl Console for MemoryConsole {
    fn write(&self, text: &str, mode: MessageMode) {
        self.messages.borrow_mut().push((mode, text.to_string()));
    }
}

impl<C: Console + ?Sized> Console for std::rc::Rc<C> {
    fn write(&self, text: &str, mode: MessageMode) {
        (**self).write(text, mode);
    }
}
