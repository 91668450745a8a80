#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Front-panel stand-ins for running the controller off-device: a keypad
//! that replays a key script and a display that draws LCD frames on a
//! terminal.

use std::collections::VecDeque;
use std::io::Write;

use tank_traits::{Display, KeyEvent, KeypadSource};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyScriptError {
    #[error("unknown key '{token}' at position {position}")]
    UnknownKey { token: String, position: usize },
}

fn named_key(token: &str) -> Option<KeyEvent> {
    Some(match token.to_ascii_lowercase().as_str() {
        "up" | "u" => KeyEvent::Up,
        "down" | "d" => KeyEvent::Down,
        "select" | "sel" | "s" | "enter" => KeyEvent::Select,
        "back" | "b" | "esc" => KeyEvent::Back,
        "clear" | "clr" | "c" => KeyEvent::Clear,
        _ => return None,
    })
}

/// Parse a key script into one entry per poll.
///
/// Tokens are separated by whitespace or commas. Named keys are `up`, `down`,
/// `select`, `back` and `clear` (plus short forms). A run of digits and dots
/// such as `7.25` types each character. `-` is a poll with no key.
pub fn parse_key_script(script: &str) -> Result<Vec<Option<KeyEvent>>, KeyScriptError> {
    let mut out = Vec::new();
    let tokens = script
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty());
    for (position, token) in tokens.enumerate() {
        if token == "-" {
            out.push(None);
        } else if let Some(key) = named_key(token) {
            out.push(Some(key));
        } else if token.chars().all(|c| c.is_ascii_digit() || c == '.') {
            out.extend(token.bytes().map(|b| {
                Some(if b == b'.' {
                    KeyEvent::DecimalPoint
                } else {
                    KeyEvent::Digit(b - b'0')
                })
            }));
        } else {
            return Err(KeyScriptError::UnknownKey {
                token: token.to_string(),
                position,
            });
        }
    }
    Ok(out)
}

/// Keypad that hands out a fixed script, one entry per poll.
#[derive(Debug, Default, Clone)]
pub struct ScriptedKeypad {
    keys: VecDeque<Option<KeyEvent>>,
}

impl ScriptedKeypad {
    pub fn new(keys: impl IntoIterator<Item = Option<KeyEvent>>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn from_script(script: &str) -> Result<Self, KeyScriptError> {
        parse_key_script(script).map(Self::new)
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl KeypadSource for ScriptedKeypad {
    fn poll(&mut self) -> Option<KeyEvent> {
        self.keys.pop_front().flatten()
    }
}

/// Draw a frame inside a box `width` characters wide.
pub fn boxed_frame(text: &str, width: usize) -> String {
    let border = format!("+{}+", "-".repeat(width));
    let mut out = border.clone();
    for line in text.lines() {
        let line: String = line.chars().take(width).collect();
        out.push_str(&format!("\n|{line:<width$}|"));
    }
    out.push('\n');
    out.push_str(&border);
    out
}

/// LCD emulation on any writer (stdout in the CLI).
pub struct TerminalDisplay {
    out: Box<dyn Write>,
    width: usize,
    frames: u64,
}

impl TerminalDisplay {
    pub fn new(out: Box<dyn Write>, width: usize) -> Self {
        Self {
            out,
            width,
            frames: 0,
        }
    }

    pub fn stdout(width: usize) -> Self {
        Self::new(Box::new(std::io::stdout()), width)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Display for TerminalDisplay {
    fn render(&mut self, text: &str) {
        self.frames += 1;
        let frame = boxed_frame(text, self.width);
        if let Err(e) = writeln!(self.out, "{frame}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "display write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn script_expands_numbers_and_idles() {
        let keys = parse_key_script("down, down sel 7.5 - s").unwrap();
        assert_eq!(
            keys,
            vec![
                Some(KeyEvent::Down),
                Some(KeyEvent::Down),
                Some(KeyEvent::Select),
                Some(KeyEvent::Digit(7)),
                Some(KeyEvent::DecimalPoint),
                Some(KeyEvent::Digit(5)),
                None,
                Some(KeyEvent::Select),
            ]
        );
    }

    #[rstest]
    fn unknown_token_is_reported() {
        assert_eq!(
            parse_key_script("up left"),
            Err(KeyScriptError::UnknownKey {
                token: "left".into(),
                position: 1
            })
        );
    }

    #[rstest]
    fn keypad_replays_then_runs_dry() {
        let mut k = ScriptedKeypad::from_script("up - back").unwrap();
        assert_eq!(k.poll(), Some(KeyEvent::Up));
        assert_eq!(k.poll(), None);
        assert_eq!(k.poll(), Some(KeyEvent::Back));
        assert_eq!(k.remaining(), 0);
        assert_eq!(k.poll(), None);
    }

    #[rstest]
    fn frame_is_padded_to_width() {
        assert_eq!(
            boxed_frame("ab\ncdefgh", 4),
            "+----+\n|ab  |\n|cdef|\n+----+"
        );
    }
}
