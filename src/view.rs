//! Presentation seam.
//!
//! The controller never touches a concrete front-end; it drives a
//! `ChatView`. The terminal binary and the test recorder implement it.

use std::fmt;

/// Opaque reference to one bot message on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub u64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

pub trait ChatView: Send + Sync {
    /// Show a patient message (plain text, never rendered as markup).
    fn display_user_message(&self, text: &str);

    /// Create an empty bot message and return its handle.
    fn open_bot_message(&self) -> MessageHandle;

    /// Replace a bot message with the latest render of the full buffer.
    ///
    /// `visible_text` is the buffer with the sentinel line withheld; `html`
    /// is the sanitized render of the same text.
    fn update_bot_message(&self, handle: MessageHandle, visible_text: &str, html: &str);

    /// Overwrite a bot message with an error and mark it as such.
    fn show_error(&self, handle: MessageHandle, message: &str);

    fn show_loading(&self);

    fn remove_loading(&self);
}
