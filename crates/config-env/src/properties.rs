//! Reader for `.properties` files
//!
//! Handles the parts of the format configuration repositories use: `#` and
//! `!` comments, `=`/`:`/whitespace separators, backslash line continuations
//! and the usual escapes including `\uXXXX`.

use crate::environment::PropertyMap;

/// Parse properties text into an ordered map. Later duplicates win.
pub fn parse(content: &str) -> PropertyMap {
    let mut map = PropertyMap::new();
    for line in logical_lines(content) {
        let (key, value) = split_entry(&line);
        map.insert(unescape(key), unescape(value));
    }
    map
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in content.lines() {
        let piece = match pending {
            Some(_) => raw.trim_start(),
            None => {
                let trimmed = raw.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed
            }
        };

        let continues = trailing_backslashes(piece) % 2 == 1;
        let piece = if continues { &piece[..piece.len() - 1] } else { piece };

        let line = pending.get_or_insert_with(String::new);
        line.push_str(piece);
        if !continues {
            lines.extend(pending.take());
        }
    }
    lines.extend(pending);
    lines
}

fn trailing_backslashes(s: &str) -> usize {
    s.bytes().rev().take_while(|&b| b == b'\\').count()
}

/// Split a logical line at the first unescaped separator.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t', '\x0c']))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
