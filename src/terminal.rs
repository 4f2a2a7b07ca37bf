use crate::types::Message;
use crate::view::MessageLog;
use std::io::Write;
use tracing::warn;

const INDICATOR: &str = "Bot: ...";
const ERASE_LINE: &str = "\r\x1b[2K";

/// Message list rendered as lines on a terminal.
///
/// The typing indicator is written without a trailing newline so it can be
/// erased in place when the reply lands.
pub struct TerminalLog<W> {
    out: W,
    indicator_shown: bool,
}

impl<W: Write + Send> TerminalLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indicator_shown: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()) {
            warn!(error = %err, "failed to write to terminal");
        }
    }
}

impl<W: Write + Send> MessageLog for TerminalLog<W> {
    fn append(&mut self, message: &Message) {
        if self.indicator_shown {
            // Keep the indicator below the newest message.
            self.write(ERASE_LINE);
        }
        let line = format_line(message);
        self.write(&line);
        self.write("\n");
        if self.indicator_shown {
            self.write(INDICATOR);
        }
    }

    fn insert_indicator(&mut self) -> bool {
        if self.indicator_shown {
            return false;
        }
        self.indicator_shown = true;
        self.write(INDICATOR);
        true
    }

    fn remove_indicator(&mut self) -> bool {
        if !self.indicator_shown {
            return false;
        }
        self.indicator_shown = false;
        self.write(ERASE_LINE);
        true
    }

    fn scroll_to_latest(&mut self) {
        if let Err(err) = self.out.flush() {
            warn!(error = %err, "failed to flush terminal");
        }
    }
}

pub fn format_line(message: &Message) -> String {
    format!("{}: {}", message.sender, sanitize(&message.text))
}

/// Drops control characters so server text cannot move the cursor or
/// recolor the terminal. Newlines and tabs survive.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
