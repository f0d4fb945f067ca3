// Licensed under the Apache-2.0 license

//! Console command-line plumbing.
//!
//! A fixed-capacity line buffer meant to be filled one byte at a time from
//! the UART receive interrupt, behind a [`crate::mutex::Spinlock`]. The
//! buffer itself performs no I/O; each push reports what the caller should
//! echo so the interrupt handler stays trivial.

use heapless::Vec;

/// What happened to the byte just pushed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// Stored; echo it back.
    Echo(u8),
    /// Last character removed; echo a destructive backspace.
    Backspace,
    /// Terminator received; the line is ready to consume.
    Complete,
    /// The buffer was full; it has been reset and the line is lost.
    Overflow,
    /// Ignored (control character, or backspace on an empty line).
    Ignored,
}

pub struct LineBuffer<const N: usize> {
    bytes: Vec<u8, N>,
    complete: bool,
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            complete: false,
        }
    }

    /// Feed one received byte.
    pub fn push(&mut self, byte: u8) -> LineEvent {
        if self.complete {
            // Line not consumed yet; drop input rather than corrupt it
            return LineEvent::Ignored;
        }
        match byte {
            b'\r' | b'\n' => {
                self.complete = true;
                LineEvent::Complete
            }
            0x08 | 0x7f => {
                if self.bytes.pop().is_some() {
                    LineEvent::Backspace
                } else {
                    LineEvent::Ignored
                }
            }
            0x20..=0x7e => {
                if self.bytes.push(byte).is_ok() {
                    LineEvent::Echo(byte)
                } else {
                    self.reset();
                    LineEvent::Overflow
                }
            }
            _ => LineEvent::Ignored,
        }
    }

    /// Whether a complete line is waiting.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The buffered line, valid ASCII by construction.
    #[must_use]
    pub fn line(&self) -> &str {
        core::str::from_utf8(&self.bytes).unwrap_or("")
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.complete = false;
    }
}

/// Parse an unsigned number, decimal or `0x` hexadecimal.
#[must_use]
pub fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Split a command line into the command word and the rest.
#[must_use]
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest.trim_start()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_accumulates_and_completes() {
        let mut buf = LineBuffer::<16>::new();
        for b in b"r 0x10 4" {
            assert_eq!(buf.push(*b), LineEvent::Echo(*b));
        }
        assert_eq!(buf.push(b'\r'), LineEvent::Complete);
        assert!(buf.is_complete());
        assert_eq!(buf.line(), "r 0x10 4");
        buf.reset();
        assert!(!buf.is_complete());
        assert_eq!(buf.line(), "");
    }

    #[test]
    fn backspace_edits_the_line() {
        let mut buf = LineBuffer::<16>::new();
        buf.push(b'a');
        buf.push(b'b');
        assert_eq!(buf.push(0x08), LineEvent::Backspace);
        assert_eq!(buf.push(0x7f), LineEvent::Backspace);
        // Nothing left to delete
        assert_eq!(buf.push(0x08), LineEvent::Ignored);
        buf.push(b'c');
        buf.push(b'\n');
        assert_eq!(buf.line(), "c");
    }

    #[test]
    fn overflow_resets_the_buffer() {
        let mut buf = LineBuffer::<4>::new();
        for b in b"abcd" {
            buf.push(*b);
        }
        assert_eq!(buf.push(b'e'), LineEvent::Overflow);
        assert_eq!(buf.line(), "");
        // Still usable afterwards
        assert_eq!(buf.push(b'x'), LineEvent::Echo(b'x'));
    }

    #[test]
    fn completed_line_ignores_input_until_reset() {
        let mut buf = LineBuffer::<16>::new();
        buf.push(b'm');
        buf.push(b'\r');
        assert_eq!(buf.push(b'z'), LineEvent::Ignored);
        assert_eq!(buf.line(), "m");
    }

    #[test]
    fn control_characters_are_ignored() {
        let mut buf = LineBuffer::<16>::new();
        assert_eq!(buf.push(0x1b), LineEvent::Ignored);
        assert_eq!(buf.push(0x00), LineEvent::Ignored);
        assert_eq!(buf.line(), "");
    }

    #[test]
    fn numbers_parse_in_both_bases() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x2a"), Some(0x2a));
        assert_eq!(parse_number("0X2A"), Some(0x2a));
        assert_eq!(parse_number("  0x1000 "), Some(0x1000));
        assert_eq!(parse_number("zz"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("0x"), None);
    }

    #[test]
    fn command_splitting() {
        assert_eq!(split_command("r 0x10 4"), ("r", "0x10 4"));
        assert_eq!(split_command("d"), ("d", ""));
        assert_eq!(split_command("  w  1 2"), ("w", "1 2"));
    }
}
