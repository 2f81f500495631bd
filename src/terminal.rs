//! `ChatView` for a plain terminal.
//!
//! Streams the visible text as it grows; the rendered HTML is kept so the
//! binary can print it on request.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use colored::Colorize;

use crate::view::{ChatView, MessageHandle};

const LOADING_MARKER: &str = "…";

#[derive(Default)]
struct TerminalState {
    current: Option<MessageHandle>,
    printed: String,
    last_html: String,
}

#[derive(Default)]
pub struct TerminalView {
    state: Mutex<TerminalState>,
    next_handle: AtomicU64,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML of the most recently updated bot message.
    pub fn last_html(&self) -> String {
        self.state
            .lock()
            .map(|s| s.last_html.clone())
            .unwrap_or_default()
    }

    /// End the current bot line.
    pub fn finish_message(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.current.take().is_some() {
                println!();
            }
        }
    }
}

/// What to write so the screen shows `visible` after `printed`.
///
/// Appends when `visible` extends what is on screen, otherwise reprints.
fn delta<'a>(printed: &str, visible: &'a str) -> (bool, &'a str) {
    match visible.strip_prefix(printed) {
        Some(suffix) => (false, suffix),
        None => (true, visible),
    }
}

fn flush() {
    let _ = io::stdout().flush();
}

impl ChatView for TerminalView {
    fn display_user_message(&self, text: &str) {
        println!("{} {}", "Anda:".bold(), text);
    }

    fn open_bot_message(&self) -> MessageHandle {
        let handle = MessageHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut state) = self.state.lock() {
            state.current = Some(handle);
            state.printed.clear();
        }
        print!("{} ", "Bot:".bold().cyan());
        flush();
        handle
    }

    fn update_bot_message(&self, handle: MessageHandle, visible_text: &str, html: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.last_html = html.to_string();
        if state.current != Some(handle) {
            return;
        }
        let (reprint, text) = delta(&state.printed, visible_text);
        if reprint {
            print!("\n{} {}", "Bot:".bold().cyan(), text);
        } else {
            print!("{text}");
        }
        state.printed = visible_text.to_string();
        flush();
    }

    fn show_error(&self, handle: MessageHandle, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            if state.current == Some(handle) && !state.printed.is_empty() {
                println!();
            }
            state.printed = message.to_string();
        }
        print!("{}", message.red());
        flush();
    }

    fn show_loading(&self) {
        print!("{}", LOADING_MARKER.dimmed());
        flush();
    }

    fn remove_loading(&self) {
        // Back over the marker, blank it, back again.
        print!("\u{8} \u{8}");
        flush();
    }
}
