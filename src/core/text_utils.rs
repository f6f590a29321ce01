// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for tokenization, symbol names and reporting.

/// Check if a byte is a valid identifier start character (letter or underscore).
#[inline]
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Check if a byte is a valid identifier continuation character.
///
/// The dot is part of identifiers so that qualified names (`ns.label`) and
/// width-suffixed mnemonics (`lda.w`) scan as a single token.
#[inline]
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

/// Check if a byte is whitespace (space or tab).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Cheap local labels start with an underscore.
#[inline]
pub fn is_cheap_local(name: &str) -> bool {
    name.starts_with('_')
}

/// Split a `lda.w` style mnemonic into its base and width suffix text.
pub fn split_suffix(mnemonic: &str) -> (&str, Option<&str>) {
    match mnemonic.rsplit_once('.') {
        Some((base, suffix)) if !base.is_empty() && !suffix.is_empty() => (base, Some(suffix)),
        _ => (mnemonic, None),
    }
}

/// Render a source line with the character at `column` (1-based) marked.
///
/// With colour the character is highlighted in place; without colour a caret
/// line is appended beneath the gutter.
pub fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    let column = match column {
        Some(col) if col > 0 => col,
        _ => return line.to_string(),
    };
    let idx = column - 1;
    if use_color {
        if idx >= line.len() || !line.is_char_boundary(idx) {
            return format!("{line}\x1b[31m^\x1b[0m");
        }
        let (head, tail) = line.split_at(idx);
        let ch = tail.chars().next().unwrap_or(' ');
        let rest = &tail[ch.len_utf8()..];
        return format!("{head}\x1b[31m{ch}\x1b[0m{rest}");
    }
    let pad: String = line
        .chars()
        .take(idx)
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    let pad = if idx > line.chars().count() {
        format!("{pad}{}", " ".repeat(idx - line.chars().count()))
    } else {
        pad
    };
    format!("{line}\n      | {pad}^")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ident_start() {
        assert!(is_ident_start(b'a'));
        assert!(is_ident_start(b'Z'));
        assert!(is_ident_start(b'_'));
        assert!(!is_ident_start(b'0'));
        assert!(!is_ident_start(b'.'));
    }

    #[test]
    fn test_is_ident_char() {
        assert!(is_ident_char(b'a'));
        assert!(is_ident_char(b'0'));
        assert!(is_ident_char(b'_'));
        assert!(is_ident_char(b'.'));
        assert!(!is_ident_char(b'$'));
        assert!(!is_ident_char(b' '));
    }

    #[test]
    fn split_suffix_separates_width() {
        assert_eq!(split_suffix("lda.w"), ("lda", Some("w")));
        assert_eq!(split_suffix("lda"), ("lda", None));
        assert_eq!(split_suffix(".byte"), (".byte", None));
    }

    #[test]
    fn highlight_without_color_adds_caret_line() {
        let out = highlight_line("  lda #$1234", Some(7), false);
        assert_eq!(out, "  lda #$1234\n      |       ^");
    }

    #[test]
    fn highlight_with_color_wraps_character() {
        let out = highlight_line("nop", Some(1), true);
        assert_eq!(out, "\x1b[31mn\x1b[0mop");
    }
}
