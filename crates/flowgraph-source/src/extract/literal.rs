//! Python string literal handling: prefixes, escape decoding and docstring
//! cleanup.

/// Prefix flags of a string literal (`r`, `b`, `f`, `u` in any case/order).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringPrefix {
    pub raw: bool,
    pub bytes: bool,
    pub format: bool,
}

impl StringPrefix {
    /// Parses the prefix from a `string_start` token such as `rf"""`.
    pub fn from_start_token(token: &str) -> Self {
        let prefix = token.trim_end_matches(['"', '\'']);
        let mut flags = StringPrefix::default();
        for c in prefix.chars() {
            match c.to_ascii_lowercase() {
                'r' => flags.raw = true,
                'b' => flags.bytes = true,
                'f' => flags.format = true,
                _ => {}
            }
        }
        flags
    }
}

/// Decodes one literal segment of a string according to its prefix.
pub fn decode_segment(text: &str, prefix: StringPrefix) -> String {
    let text = if prefix.format {
        text.replace("{{", "{").replace("}}", "}")
    } else {
        text.to_string()
    };
    if prefix.raw {
        text
    } else {
        decode_escapes(&text)
    }
}

/// Decodes backslash escapes the way the Python tokenizer does for `str`
/// literals. Unknown escapes are kept verbatim.
pub fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut digits = String::from(next);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                let value = u32::from_str_radix(&digits, 8).ok();
                push_code_point(&mut out, value, &format!("\\{}", digits));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.by_ref().take(width).collect();
                let value = if digits.len() == width {
                    u32::from_str_radix(&digits, 16).ok()
                } else {
                    None
                };
                push_code_point(&mut out, value, &format!("\\{}{}", next, digits));
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn push_code_point(out: &mut String, value: Option<u32>, original: &str) {
    match value.and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push_str(original),
    }
}

/// Cleans a docstring like `inspect.cleandoc`: tabs expanded, the first
/// line's leading spaces stripped, the common indentation of the remaining
/// non-blank lines removed, then empty lines dropped from both ends.
///
/// A trailing line that still holds spaces after the margin is cut is not
/// empty and is kept.
pub fn cleandoc(doc: &str) -> String {
    let lines: Vec<String> = doc.split('\n').map(expand_tabs).collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim_start_matches(' ').is_empty())
        .map(|l| indent_width(l))
        .min();

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim_start_matches(' '));
        } else {
            // Lines with content are indented at least `margin`; shorter
            // ones are all spaces.
            let cut = margin.map_or(0, |m| m.min(line.len()));
            cleaned.push(&line[cut..]);
        }
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    let first = cleaned
        .iter()
        .position(|l| !l.is_empty())
        .unwrap_or(cleaned.len());
    cleaned[first..].join("\n")
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - column % 8;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}
