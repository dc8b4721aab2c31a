//! Key sequence parsing
//!
//! Shortcut files describe keystrokes with a small mini-language:
//!
//! ```text
//! f            -> the "f" key
//! {SPACE}      -> a named key
//! {TAB 3}      -> a named key, repeated
//! ^f  +x  %d   -> ctrl / shift / alt applied to the next key
//! ^(ab)        -> ctrl applied to every key in the group
//! ~            -> enter
//! {+} {{} {}}  -> escaped syntax characters
//! ```
//!
//! Sequences are parsed when the shortcut file is loaded, so a typo shows up
//! at start-up rather than on the first button press.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// Types
// ============================================================================

/// Modifier keys held while a key is pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    #[cfg(any(target_os = "macos", windows))]
    pub fn is_empty(&self) -> bool {
        !(self.shift || self.ctrl || self.alt)
    }

    fn union(self, other: Modifiers) -> Modifiers {
        Modifiers {
            shift: self.shift || other.shift,
            ctrl: self.ctrl || other.ctrl,
            alt: self.alt || other.alt,
        }
    }
}

/// Non-character keys addressable with `{NAME}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Escape,
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
    /// Function key F1..=F20
    F(u8),
    VolumeUp,
    VolumeDown,
    VolumeMute,
    MediaPlayPause,
    MediaNextTrack,
    MediaPrevTrack,
    MediaStop,
}

impl NamedKey {
    /// Look up a key by its (case-insensitive) name
    pub fn from_name(name: &str) -> Option<NamedKey> {
        let upper = name.to_ascii_uppercase();
        let key = match upper.as_str() {
            "SPACE" => NamedKey::Space,
            "ENTER" | "RETURN" => NamedKey::Enter,
            "TAB" => NamedKey::Tab,
            "ESC" | "ESCAPE" => NamedKey::Escape,
            "BACKSPACE" | "BS" | "BKSP" => NamedKey::Backspace,
            "DELETE" | "DEL" => NamedKey::Delete,
            "INSERT" | "INS" => NamedKey::Insert,
            "HOME" => NamedKey::Home,
            "END" => NamedKey::End,
            "PGUP" | "PAGEUP" => NamedKey::PageUp,
            "PGDN" | "PAGEDOWN" => NamedKey::PageDown,
            "UP" => NamedKey::Up,
            "DOWN" => NamedKey::Down,
            "LEFT" => NamedKey::Left,
            "RIGHT" => NamedKey::Right,
            "VOLUME_UP" => NamedKey::VolumeUp,
            "VOLUME_DOWN" => NamedKey::VolumeDown,
            "VOLUME_MUTE" => NamedKey::VolumeMute,
            "MEDIA_PLAY_PAUSE" => NamedKey::MediaPlayPause,
            "MEDIA_NEXT_TRACK" => NamedKey::MediaNextTrack,
            "MEDIA_PREV_TRACK" => NamedKey::MediaPrevTrack,
            "MEDIA_STOP" => NamedKey::MediaStop,
            other => {
                let n: u8 = other.strip_prefix('F')?.parse().ok()?;
                if !(1..=20).contains(&n) {
                    return None;
                }
                NamedKey::F(n)
            }
        };
        Some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Named(NamedKey),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "'{}'", c),
            Key::Named(NamedKey::F(n)) => write!(f, "F{}", n),
            Key::Named(k) => write!(f, "{:?}", k),
        }
    }
}

/// One key press (down + up) with the modifiers held around it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl KeyStroke {
    fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }
}

/// A parsed key sequence that remembers the text it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySequence {
    source: String,
    strokes: Vec<KeyStroke>,
}

impl KeySequence {
    pub fn parse(source: &str) -> Result<Self, KeySequenceError> {
        let strokes = Parser::new(source).parse()?;
        Ok(Self {
            source: source.to_string(),
            strokes,
        })
    }

    /// The sequence exactly as written in the shortcut file
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn strokes(&self) -> &[KeyStroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

impl FromStr for KeySequence {
    type Err = KeySequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeySequence::parse(s)
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySequenceError {
    #[error("unterminated '{{' at position {0}")]
    UnterminatedBrace(usize),
    #[error("unknown key name '{0}'")]
    UnknownKey(String),
    #[error("invalid repeat count in '{{{0}}}' (expected 1 to 100)")]
    BadRepeat(String),
    #[error("modifier at position {0} has nothing to modify")]
    DanglingModifier(usize),
    #[error("unbalanced parenthesis at position {0}")]
    UnbalancedParen(usize),
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

/// Upper bound for `{NAME n}`
const MAX_REPEAT: usize = 100;

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<KeyStroke>, KeySequenceError> {
        let strokes = self.parse_run(Modifiers::NONE, false)?;
        debug_assert_eq!(self.pos, self.chars.len());
        Ok(strokes)
    }

    /// Parse until end of input, or until a `)` when inside a group
    fn parse_run(
        &mut self,
        inherited: Modifiers,
        in_group: bool,
    ) -> Result<Vec<KeyStroke>, KeySequenceError> {
        let mut out = Vec::new();
        let mut pending = Modifiers::NONE;
        let mut pending_at: Option<usize> = None;

        while let Some(&c) = self.chars.get(self.pos) {
            let held = inherited.union(pending);
            match c {
                '+' | '^' | '%' => {
                    match c {
                        '+' => pending.shift = true,
                        '^' => pending.ctrl = true,
                        _ => pending.alt = true,
                    }
                    pending_at.get_or_insert(self.pos);
                    self.pos += 1;
                    continue;
                }
                '(' => {
                    let open = self.pos;
                    self.pos += 1;
                    let group = self.parse_run(held, true)?;
                    if self.chars.get(self.pos) != Some(&')') {
                        return Err(KeySequenceError::UnbalancedParen(open));
                    }
                    self.pos += 1;
                    if group.is_empty()
                        && let Some(at) = pending_at
                    {
                        return Err(KeySequenceError::DanglingModifier(at));
                    }
                    out.extend(group);
                }
                ')' => {
                    if in_group {
                        break;
                    }
                    return Err(KeySequenceError::UnbalancedParen(self.pos));
                }
                '{' => {
                    let (key, count) = self.parse_brace()?;
                    out.extend(std::iter::repeat_n(KeyStroke::new(held, key), count));
                }
                '~' => {
                    self.pos += 1;
                    out.push(KeyStroke::new(held, Key::Named(NamedKey::Enter)));
                }
                other => {
                    self.pos += 1;
                    out.push(KeyStroke::new(held, Key::Char(other)));
                }
            }
            pending = Modifiers::NONE;
            pending_at = None;
        }

        if let Some(at) = pending_at {
            return Err(KeySequenceError::DanglingModifier(at));
        }
        Ok(out)
    }

    /// Parse `{...}` starting at the opening brace
    fn parse_brace(&mut self) -> Result<(Key, usize), KeySequenceError> {
        let open = self.pos;
        let body_start = open + 1;
        if body_start >= self.chars.len() {
            return Err(KeySequenceError::UnterminatedBrace(open));
        }

        // The first body char may itself be a brace: `{{}` and `{}}`
        let close = self.chars[body_start + 1..]
            .iter()
            .position(|&c| c == '}')
            .map(|i| body_start + 1 + i)
            .ok_or(KeySequenceError::UnterminatedBrace(open))?;

        let body: String = self.chars[body_start..close].iter().collect();
        self.pos = close + 1;

        let mut chars = body.chars();
        if let (Some(only), None) = (chars.next(), chars.next()) {
            return Ok((Key::Char(only), 1));
        }

        let mut parts = body.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let count = match (parts.next(), parts.next()) {
            (None, _) => 1,
            (Some(n), None) => match n.parse::<usize>() {
                Ok(n) if (1..=MAX_REPEAT).contains(&n) => n,
                _ => return Err(KeySequenceError::BadRepeat(body.clone())),
            },
            (Some(_), Some(_)) => return Err(KeySequenceError::BadRepeat(body.clone())),
        };

        let key = if name.chars().count() == 1 {
            name.chars().next().map(Key::Char)
        } else {
            NamedKey::from_name(name).map(Key::Named)
        }
        .ok_or_else(|| KeySequenceError::UnknownKey(name.to_string()))?;

        Ok((key, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strokes(s: &str) -> Vec<KeyStroke> {
        KeySequence::parse(s).unwrap().strokes().to_vec()
    }

    const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
    };
    const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };

    #[test]
    fn test_named_and_literal_keys() {
        assert_eq!(
            strokes("{SPACE}"),
            vec![KeyStroke::new(Modifiers::NONE, Key::Named(NamedKey::Space))]
        );
        assert_eq!(
            strokes("f"),
            vec![KeyStroke::new(Modifiers::NONE, Key::Char('f'))]
        );
        assert_eq!(strokes("{f5}")[0].key, Key::Named(NamedKey::F(5)));
        assert_eq!(strokes("~")[0].key, Key::Named(NamedKey::Enter));
        assert_eq!(strokes("{VOLUME_UP}")[0].key, Key::Named(NamedKey::VolumeUp));
    }

    #[test]
    fn test_modifiers_apply_to_next_key_only() {
        let s = strokes("^fx");
        assert_eq!(s[0], KeyStroke::new(CTRL, Key::Char('f')));
        assert_eq!(s[1], KeyStroke::new(Modifiers::NONE, Key::Char('x')));

        let s = strokes("%{F4}");
        assert!(s[0].modifiers.alt);
        assert_eq!(s[0].key, Key::Named(NamedKey::F(4)));

        let s = strokes("^+{RIGHT}");
        assert!(s[0].modifiers.ctrl && s[0].modifiers.shift);
    }

    #[test]
    fn test_group_modifiers() {
        let s = strokes("+(ab)c");
        assert_eq!(
            s,
            vec![
                KeyStroke::new(SHIFT, Key::Char('a')),
                KeyStroke::new(SHIFT, Key::Char('b')),
                KeyStroke::new(Modifiers::NONE, Key::Char('c')),
            ]
        );

        // Nested group inherits the outer modifier
        let s = strokes("^(a+(b))");
        assert_eq!(s[0].modifiers, CTRL);
        assert!(s[1].modifiers.ctrl && s[1].modifiers.shift);
    }

    #[test]
    fn test_repeat_and_escapes() {
        assert_eq!(strokes("{TAB 3}").len(), 3);
        assert_eq!(strokes("{{}")[0].key, Key::Char('{'));
        assert_eq!(strokes("{}}")[0].key, Key::Char('}'));
        assert_eq!(strokes("{+}")[0], KeyStroke::new(Modifiers::NONE, Key::Char('+')));
        assert_eq!(strokes("{a 2}").len(), 2);
    }

    #[test]
    fn test_empty_sequence_has_no_strokes() {
        let seq = KeySequence::parse("").unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.as_str(), "");
    }

    #[test]
    fn test_source_text_is_kept() {
        let seq: KeySequence = "{SPACE}".parse().unwrap();
        assert_eq!(seq.as_str(), "{SPACE}");
        assert_eq!(seq.to_string(), "{SPACE}");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            KeySequence::parse("{SPACE"),
            Err(KeySequenceError::UnterminatedBrace(0))
        );
        assert_eq!(
            KeySequence::parse("a{"),
            Err(KeySequenceError::UnterminatedBrace(1))
        );
        assert_eq!(
            KeySequence::parse("{BOGUS}"),
            Err(KeySequenceError::UnknownKey("BOGUS".into()))
        );
        assert_eq!(
            KeySequence::parse("{F42}"),
            Err(KeySequenceError::UnknownKey("F42".into()))
        );
        assert_eq!(
            KeySequence::parse("{TAB x}"),
            Err(KeySequenceError::BadRepeat("TAB x".into()))
        );
        assert_eq!(
            KeySequence::parse("{TAB 0}"),
            Err(KeySequenceError::BadRepeat("TAB 0".into()))
        );
        assert_eq!(
            KeySequence::parse("{TAB 101}"),
            Err(KeySequenceError::BadRepeat("TAB 101".into()))
        );
        assert_eq!(
            KeySequence::parse("{TAB 18446744073709551615}"),
            Err(KeySequenceError::BadRepeat("TAB 18446744073709551615".into()))
        );
        assert_eq!(KeySequence::parse("{TAB 100}").unwrap().strokes().len(), 100);
        assert_eq!(
            KeySequence::parse("a^"),
            Err(KeySequenceError::DanglingModifier(1))
        );
        assert_eq!(
            KeySequence::parse("a+()"),
            Err(KeySequenceError::DanglingModifier(1))
        );
        assert_eq!(KeySequence::parse("a()").unwrap().strokes().len(), 1);
        assert_eq!(
            KeySequence::parse("^(a"),
            Err(KeySequenceError::UnbalancedParen(1))
        );
        assert_eq!(
            KeySequence::parse("ab)"),
            Err(KeySequenceError::UnbalancedParen(2))
        );
    }
}
