//! macOS virtual key codes (ANSI / US layout)

use crate::keys::NamedKey;

pub const RETURN: u16 = 36;
pub const TAB: u16 = 48;
pub const SPACE: u16 = 49;
pub const DELETE: u16 = 51;
pub const ESCAPE: u16 = 53;
pub const HELP: u16 = 114;
pub const HOME: u16 = 115;
pub const PAGE_UP: u16 = 116;
pub const FORWARD_DELETE: u16 = 117;
pub const END: u16 = 119;
pub const PAGE_DOWN: u16 = 121;
pub const LEFT: u16 = 123;
pub const RIGHT: u16 = 124;
pub const DOWN: u16 = 125;
pub const UP: u16 = 126;

pub const VOLUME_UP: u16 = 72;
pub const VOLUME_DOWN: u16 = 73;
pub const MUTE: u16 = 74;

const F_KEYS: [u16; 20] = [
    122, 120, 99, 118, 96, 97, 98, 100, 101, 109, 103, 111, 105, 107, 113, 106, 64, 79, 80, 90,
];

/// Key code for a named key; media transport keys have none
pub fn named_key_code(key: NamedKey) -> Option<u16> {
    Some(match key {
        NamedKey::Space => SPACE,
        NamedKey::Enter => RETURN,
        NamedKey::Tab => TAB,
        NamedKey::Escape => ESCAPE,
        NamedKey::Backspace => DELETE,
        NamedKey::Delete => FORWARD_DELETE,
        // No Insert on Mac keyboards; Help sits in its place
        NamedKey::Insert => HELP,
        NamedKey::Home => HOME,
        NamedKey::End => END,
        NamedKey::PageUp => PAGE_UP,
        NamedKey::PageDown => PAGE_DOWN,
        NamedKey::Up => UP,
        NamedKey::Down => DOWN,
        NamedKey::Left => LEFT,
        NamedKey::Right => RIGHT,
        NamedKey::F(n) => *F_KEYS.get(usize::from(n).checked_sub(1)?)?,
        NamedKey::VolumeUp => VOLUME_UP,
        NamedKey::VolumeDown => VOLUME_DOWN,
        NamedKey::VolumeMute => MUTE,
        NamedKey::MediaPlayPause
        | NamedKey::MediaNextTrack
        | NamedKey::MediaPrevTrack
        | NamedKey::MediaStop => return None,
    })
}

/// Key code for a character plus whether Shift is needed to type it
pub fn char_key_code(c: char) -> Option<(u16, bool)> {
    let lower = c.to_ascii_lowercase();
    let shifted_letter = c.is_ascii_uppercase();
    let code = match lower {
        'a' => 0,
        's' => 1,
        'd' => 2,
        'f' => 3,
        'h' => 4,
        'g' => 5,
        'z' => 6,
        'x' => 7,
        'c' => 8,
        'v' => 9,
        'b' => 11,
        'q' => 12,
        'w' => 13,
        'e' => 14,
        'r' => 15,
        'y' => 16,
        't' => 17,
        'o' => 31,
        'u' => 32,
        'i' => 34,
        'p' => 35,
        'l' => 37,
        'j' => 38,
        'k' => 40,
        'n' => 45,
        'm' => 46,
        _ => return punctuation_key_code(c),
    };
    Some((code, shifted_letter))
}

fn punctuation_key_code(c: char) -> Option<(u16, bool)> {
    Some(match c {
        '1' => (18, false),
        '2' => (19, false),
        '3' => (20, false),
        '4' => (21, false),
        '6' => (22, false),
        '5' => (23, false),
        '9' => (25, false),
        '7' => (26, false),
        '8' => (28, false),
        '0' => (29, false),
        '!' => (18, true),
        '@' => (19, true),
        '#' => (20, true),
        '$' => (21, true),
        '^' => (22, true),
        '%' => (23, true),
        '(' => (25, true),
        '&' => (26, true),
        '*' => (28, true),
        ')' => (29, true),
        '=' => (24, false),
        '+' => (24, true),
        '-' => (27, false),
        '_' => (27, true),
        ']' => (30, false),
        '}' => (30, true),
        '[' => (33, false),
        '{' => (33, true),
        '\'' => (39, false),
        '"' => (39, true),
        ';' => (41, false),
        ':' => (41, true),
        '\\' => (42, false),
        '|' => (42, true),
        ',' => (43, false),
        '<' => (43, true),
        '/' => (44, false),
        '?' => (44, true),
        '.' => (47, false),
        '>' => (47, true),
        '`' => (50, false),
        '~' => (50, true),
        ' ' => (SPACE, false),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_shift() {
        assert_eq!(char_key_code('f'), Some((3, false)));
        assert_eq!(char_key_code('F'), Some((3, true)));
        assert_eq!(char_key_code('?'), Some((44, true)));
        assert_eq!(char_key_code('é'), None);
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(named_key_code(NamedKey::F(1)), Some(122));
        assert_eq!(named_key_code(NamedKey::F(20)), Some(90));
        assert_eq!(named_key_code(NamedKey::Right), Some(RIGHT));
        assert_eq!(named_key_code(NamedKey::MediaStop), None);
    }
}
