// Keyboard input: one keystroke per decision, read in raw mode so the user
// never has to press Enter.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io;

/// A keystroke, reduced to what the sorter cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    /// Ctrl-C, or the input stream ended.
    Interrupt,
}

/// What the user asked for on the current bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move to the folder shown under this key (1-9).
    Move(u8),
    /// Move to the suggested folder.
    Auto,
    /// Save a rule for the current domain.
    Save,
    Skip,
    Quit,
}

impl Command {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Enter => Some(Self::Skip),
            Key::Escape | Key::Interrupt => Some(Self::Quit),
            Key::Char(c) => match c.to_ascii_lowercase() {
                d @ '1'..='9' => Some(Self::Move(d as u8 - b'0')),
                'a' => Some(Self::Auto),
                's' => Some(Self::Save),
                'n' => Some(Self::Skip),
                'q' => Some(Self::Quit),
                _ => None,
            },
        }
    }
}

/// Source of keystrokes.
pub trait KeySource {
    fn read_key(&mut self) -> io::Result<Key>;
}

/// Reads keystrokes from the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn read_key(&mut self) -> io::Result<Key> {
        let _raw = RawMode::enable()?;
        loop {
            if let Event::Key(key) = event::read()? {
                // Some platforms report releases as well as presses.
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(key) = translate(key) {
                    return Ok(key);
                }
            }
        }
    }
}

fn translate(key: KeyEvent) -> Option<Key> {
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Key::Interrupt)
        }
        KeyCode::Char(c) => Some(Key::Char(c)),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Esc => Some(Key::Escape),
        _ => None,
    }
}

/// Raw mode for as long as the guard lives.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
