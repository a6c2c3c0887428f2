//! Source instrumentation: make a Python program print its own graph.
//!
//! [`instrument`] is a pure text transform applied in three steps, each of
//! which checks for its own prior output before acting, so the transform is
//! idempotent:
//!
//! 1. insert any missing [`REQUIRED_IMPORTS`] ahead of the program's code,
//!    below its docstring and `from __future__` imports;
//! 2. insert [`ROUTINE`] above the first top-level function (or append it);
//! 3. insert the graph-printing hook under the `if __name__ == "__main__":`
//!    guard, when there is one.
//!
//! The guard and the first `def` are found with line-anchored regexes, not a
//! parse.

use std::sync::LazyLock;

use regex::Regex;

use crate::routine::{hook_lines, HOOK_MARKER, REQUIRED_IMPORTS, ROUTINE, ROUTINE_SIGNATURE};

static FIRST_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:async[ \t]+)?def[ \t]+\w+[ \t]*\(").expect("invalid def regex")
});

static MAIN_GUARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*)if\s+__name__\s*==\s*["']__main__["']\s*:"#)
        .expect("invalid main guard regex")
});

/// Returns the instrumented form of `source`. Never fails.
pub fn instrument(source: &str) -> String {
    let text = inject_imports(source);
    let text = inject_routine(&text);
    inject_hook(&text)
}

/// Step 1: insert each required declaration that is not already present,
/// in declared order, right after the module prologue.
pub fn inject_imports(source: &str) -> String {
    let missing: Vec<&str> = REQUIRED_IMPORTS
        .iter()
        .copied()
        .filter(|import| !source.contains(import))
        .collect();
    if missing.is_empty() {
        return source.to_string();
    }
    let (before, after) = source.split_at(prologue_end(source));
    let sep = if before.is_empty() || before.ends_with('\n') { "" } else { "\n" };
    format!("{}{}{}\n{}", before, sep, missing.join("\n"), after)
}

/// Byte offset just past the module prologue: leading comments, the module
/// docstring and any `from __future__` imports, which must stay first.
fn prologue_end(source: &str) -> usize {
    let mut end = 0;
    let mut pos = 0;
    let mut docstring_allowed = true;
    while pos < source.len() {
        let next = line_end(source, pos);
        let line = source[pos..next].trim();
        if line.is_empty() {
            pos = next;
            continue;
        }
        let stmt_end = if line.starts_with('#') {
            next
        } else if is_future_import(line) {
            docstring_allowed = false;
            statement_end(source, pos)
        } else {
            match docstring_allowed.then(|| docstring_end(source, pos)).flatten() {
                Some(close) => {
                    docstring_allowed = false;
                    close
                }
                None => break,
            }
        };
        end = stmt_end;
        pos = stmt_end;
    }
    end
}

/// Offset just past the newline ending the line that starts at `pos`.
fn line_end(source: &str, pos: usize) -> usize {
    source[pos..].find('\n').map_or(source.len(), |i| pos + i + 1)
}

fn is_future_import(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("from") && words.next() == Some("__future__")
}

/// End of a simple statement starting at `pos`, following an open
/// parenthesis or a trailing backslash onto later lines.
fn statement_end(source: &str, pos: usize) -> usize {
    let mut end = line_end(source, pos);
    let mut depth = 0i32;
    let mut line = &source[pos..end];
    loop {
        depth += line.matches('(').count() as i32 - line.matches(')').count() as i32;
        let continued = line.trim_end().ends_with('\\');
        if (depth <= 0 && !continued) || end >= source.len() {
            return end;
        }
        let next = line_end(source, end);
        line = &source[end..next];
        end = next;
    }
}

/// End of the line closing a string-literal statement at `pos`, if one
/// starts there.
fn docstring_end(source: &str, pos: usize) -> Option<usize> {
    let text = &source[pos..];
    let body = text.trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B']);
    let prefix = text.len() - body.len();
    if prefix > 2 {
        return None;
    }
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| body.starts_with(q))?;
    let open = pos + prefix + quote.len();
    let close = if quote.len() == 3 {
        open + source[open..].find(quote)? + quote.len()
    } else {
        let end = line_end(source, pos);
        open + source[open..end].find(quote)? + 1
    };
    Some(line_end(source, close - 1))
}

/// Step 2: insert the routine before the first top-level function boundary,
/// keeping decorators attached to their function.
pub fn inject_routine(source: &str) -> String {
    if source.contains(ROUTINE_SIGNATURE) {
        return source.to_string();
    }
    match FIRST_DEF.find(source) {
        Some(m) => {
            let at = decorated_start(source, m.start());
            format!("{}{}\n\n{}", &source[..at], ROUTINE, &source[at..])
        }
        None => {
            let sep = if source.is_empty() || source.ends_with('\n') { "\n" } else { "\n\n" };
            format!("{}{}{}", source, sep, ROUTINE)
        }
    }
}

/// Step 3: insert the hook after the main guard line, one level deeper.
///
/// Guards with an inline body (`if __name__ == "__main__": main()`) are left
/// alone, as is a source without any guard.
pub fn inject_hook(source: &str) -> String {
    if source.contains(HOOK_MARKER) {
        return source.to_string();
    }
    let Some(caps) = MAIN_GUARD.captures(source) else {
        return source.to_string();
    };
    let (Some(guard), Some(indent)) = (caps.get(0), caps.get(1)) else {
        return source.to_string();
    };

    let line_end = source[guard.end()..]
        .find('\n')
        .map_or(source.len(), |i| guard.end() + i);
    let rest = source[guard.end()..line_end].trim();
    if !rest.is_empty() && !rest.starts_with('#') {
        return source.to_string();
    }

    let body_indent = body_indent(source, line_end, indent.as_str());
    let block = hook_lines(&body_indent).join("\n");
    format!("{}\n{}{}", &source[..line_end], block, &source[line_end..])
}

/// Walks back from a `def` line over directly preceding decorator lines.
fn decorated_start(source: &str, def_start: usize) -> usize {
    let mut start = def_start;
    while start > 0 {
        let prev_end = start - 1;
        let prev_start = source[..prev_end].rfind('\n').map_or(0, |i| i + 1);
        if source[prev_start..prev_end].starts_with('@') {
            start = prev_start;
        } else {
            break;
        }
    }
    start
}

/// Indentation for the hook: the guard body's own indentation when it is
/// deeper than the guard, else the guard's plus four spaces.
fn body_indent(source: &str, line_end: usize, guard_indent: &str) -> String {
    let following = source.get(line_end..).unwrap_or("");
    let first_body_line = following
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .find(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        });
    if let Some(line) = first_body_line {
        let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
        if indent.len() > guard_indent.len() && indent.starts_with(guard_indent) {
            return indent;
        }
    }
    format!("{}    ", guard_indent)
}
