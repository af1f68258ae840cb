// Redis-style glob patterns compiled to anchored regular expressions.

use regex::Regex;

/// Compiles a `KEYS`/`SCAN MATCH` style pattern: `*`, `?`, `[abc]`, `[^a]`,
/// `[a-z]` and `\` escapes. An unterminated `[` is matched literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 8);
    out.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut out, chars[i]);
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => push_literal(&mut out, '['),
            },
            c => push_literal(&mut out, c),
        }
        i += 1;
    }

    out.push('$');
    Regex::new(&out)
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

// Index of the `]` closing the class opened at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'^') {
        j += 1;
    }
    let body_start = j;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            ']' if j > body_start => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn push_class(out: &mut String, body: &[char]) {
    out.push('[');
    let mut j = 0;
    if body.first() == Some(&'^') {
        out.push('^');
        j = 1;
    }
    while j < body.len() {
        let c = body[j];
        match c {
            '\\' if j + 1 < body.len() => {
                j += 1;
                push_class_literal(out, body[j]);
            }
            '[' | ']' | '&' | '~' | '\\' => push_class_literal(out, c),
            _ => out.push(c),
        }
        j += 1;
    }
    out.push(']');
}

fn push_class_literal(out: &mut String, c: char) {
    if c.is_ascii_punctuation() {
        out.push('\\');
    }
    out.push(c);
}
