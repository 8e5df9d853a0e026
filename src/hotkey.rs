//! Global hotkey binding parsing.
//!
//! Bindings are written as "Ctrl+Alt+Down" style strings in the config
//! file. Parsing is OS-neutral; the resulting binding exposes the Win32
//! modifier bits and virtual-key code the platform layer registers with.

use thiserror::Error;

/// Hotkey parsing errors.
#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("failed to parse hotkey: {0}")]
    ParseError(String),
}

/// Non-modifier key of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Letter(u8),
    Digit(u8),
    Function(u8),
    Space,
    Escape,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    /// Win32 virtual-key code for this key.
    pub fn virtual_key(self) -> u32 {
        match self {
            Key::Letter(c) => c.to_ascii_uppercase() as u32,
            Key::Digit(d) => b'0' as u32 + d as u32,
            Key::Function(n) => 0x70 + (n as u32 - 1), // VK_F1..
            Key::Space => 0x20,
            Key::Escape => 0x1B,
            Key::Tab => 0x09,
            Key::Backspace => 0x08,
            Key::Delete => 0x2E,
            Key::Insert => 0x2D,
            Key::Home => 0x24,
            Key::End => 0x23,
            Key::PageUp => 0x21,
            Key::PageDown => 0x22,
            Key::Up => 0x26,
            Key::Down => 0x28,
            Key::Left => 0x25,
            Key::Right => 0x27,
        }
    }
}

/// A parsed binding: modifier set plus one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    pub key: Key,
}

impl HotkeyBinding {
    /// Modifier bits in the MOD_ALT/MOD_CONTROL/MOD_SHIFT/MOD_WIN layout
    /// RegisterHotKey expects.
    pub fn modifier_bits(&self) -> u32 {
        let mut bits = 0;
        if self.alt {
            bits |= 0x0001;
        }
        if self.ctrl {
            bits |= 0x0002;
        }
        if self.shift {
            bits |= 0x0004;
        }
        if self.win {
            bits |= 0x0008;
        }
        bits
    }
}

/// Parse a hotkey string like "Ctrl+Alt+Down" into a binding.
pub fn parse_hotkey(s: &str) -> Result<HotkeyBinding, HotkeyError> {
    let parts: Vec<&str> = s.split('+').map(|p| p.trim()).collect();
    if parts.iter().all(|p| p.is_empty()) {
        return Err(HotkeyError::ParseError("empty hotkey".to_string()));
    }

    let mut binding = HotkeyBinding {
        ctrl: false,
        alt: false,
        shift: false,
        win: false,
        key: Key::Down,
    };
    let mut key: Option<Key> = None;

    for part in parts {
        let lower = part.to_lowercase();
        match lower.as_str() {
            "ctrl" | "control" => binding.ctrl = true,
            "alt" => binding.alt = true,
            "shift" => binding.shift = true,
            "win" | "super" | "meta" => binding.win = true,
            _ => {
                if key.is_some() {
                    return Err(HotkeyError::ParseError(format!(
                        "more than one key in '{s}'"
                    )));
                }
                key = Some(parse_key(part)?);
            }
        }
    }

    binding.key = key.ok_or_else(|| HotkeyError::ParseError("no key specified".to_string()))?;
    Ok(binding)
}

/// Parse a single key name.
fn parse_key(s: &str) -> Result<Key, HotkeyError> {
    let lower = s.to_lowercase();
    let key = match lower.as_str() {
        "space" => Key::Space,
        "escape" | "esc" => Key::Escape,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" | "ins" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" | "pgdown" => Key::PageDown,
        "up" | "arrowup" => Key::Up,
        "down" | "arrowdown" => Key::Down,
        "left" | "arrowleft" => Key::Left,
        "right" | "arrowright" => Key::Right,
        _ => {
            let bytes = lower.as_bytes();
            if bytes.len() == 1 && bytes[0].is_ascii_lowercase() {
                Key::Letter(bytes[0])
            } else if bytes.len() == 1 && bytes[0].is_ascii_digit() {
                Key::Digit(bytes[0] - b'0')
            } else if let Some(n) = lower
                .strip_prefix('f')
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| (1..=12).contains(n))
            {
                Key::Function(n)
            } else {
                return Err(HotkeyError::ParseError(format!("unknown key: {s}")));
            }
        }
    };
    Ok(key)
}
