//! The line-oriented layout text format.
//!
//! ```text
//! atlas <width>,<height>
//! scale <factor>
//! sprite "<path>" <x>,<y> <w>,<h> [<trim_left>,<trim_top> <trim_right>,<trim_bottom>]
//! ```
//!
//! Trim fields appear only when the layout was built with trimming. `atlas <w> <h>` is accepted
//! on input for older files.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::error::ParseError;
use crate::model::{Layout, Sprite, Trim};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Quoted(String),
    Bare(&'a str),
}

impl Token<'_> {
    pub(crate) fn bare(&self) -> Option<&str> {
        match self {
            Token::Bare(s) => Some(s),
            Token::Quoted(_) => None,
        }
    }
}

/// Wraps `s` in double quotes, escaping `"` and `\`.
pub fn quote_path(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Splits a line into whitespace-separated tokens; double-quoted tokens are unescaped.
pub(crate) fn tokenize(line: &str) -> Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, e @ ('"' | '\\'))) => value.push(e),
                        Some((_, e)) => return Err(format!("invalid escape '\\{e}'")),
                        None => return Err("dangling escape at end of line".into()),
                    },
                    other => value.push(other),
                }
            }
            if !closed {
                return Err("unterminated quoted string".into());
            }
            tokens.push(Token::Quoted(value));
            continue;
        }
        let mut end = line.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() {
                end = i;
                break;
            }
            chars.next();
        }
        tokens.push(Token::Bare(&line[start..end]));
    }
    Ok(tokens)
}

fn parse_u32(s: &str, what: &str, line: usize) -> Result<u32, ParseError> {
    s.parse::<u32>()
        .map_err(|_| ParseError::new(line, format!("invalid {what} '{s}'")))
}

fn parse_pair(tok: Option<&Token<'_>>, what: &str, line: usize) -> Result<(u32, u32), ParseError> {
    let s = tok
        .and_then(Token::bare)
        .ok_or_else(|| ParseError::new(line, format!("missing {what}")))?;
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| ParseError::new(line, format!("expected <a>,<b> for {what}, got '{s}'")))?;
    Ok((parse_u32(a, what, line)?, parse_u32(b, what, line)?))
}

/// Renders `layout` as layout text (one trailing newline per line).
pub fn format_layout(layout: &Layout) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "atlas {},{}", layout.width, layout.height);
    let _ = writeln!(out, "scale {}", layout.scale);
    for s in &layout.sprites {
        let _ = write!(
            out,
            "sprite {} {},{} {},{}",
            quote_path(&s.path),
            s.x,
            s.y,
            s.w,
            s.h
        );
        if layout.trim {
            let t = s.trim;
            let _ = write!(out, " {},{} {},{}", t.left, t.top, t.right, t.bottom);
        }
        out.push('\n');
    }
    out
}

/// Parses layout text produced by [`format_layout`] (or the legacy atlas form).
pub fn parse_layout(text: &str) -> Result<Layout, ParseError> {
    let mut atlas: Option<(u32, u32)> = None;
    let mut scale: Option<f64> = None;
    let mut sprites = Vec::new();
    let mut trim_seen: Option<bool> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let tokens = tokenize(raw).map_err(|m| ParseError::new(line, m))?;
        let Some(first) = tokens.first() else {
            continue;
        };
        let keyword = first
            .bare()
            .ok_or_else(|| ParseError::new(line, "line must start with a keyword"))?;
        match keyword {
            "atlas" => {
                if atlas.is_some() {
                    return Err(ParseError::new(line, "duplicate atlas line"));
                }
                let size = match tokens.len() {
                    2 => parse_pair(tokens.get(1), "atlas size", line)?,
                    3 => {
                        let w = tokens[1].bare().ok_or_else(|| ParseError::new(line, "invalid atlas width"))?;
                        let h = tokens[2].bare().ok_or_else(|| ParseError::new(line, "invalid atlas height"))?;
                        (parse_u32(w, "atlas width", line)?, parse_u32(h, "atlas height", line)?)
                    }
                    _ => return Err(ParseError::new(line, "expected 'atlas <w>,<h>'")),
                };
                atlas = Some(size);
            }
            "scale" => {
                if scale.is_some() {
                    return Err(ParseError::new(line, "duplicate scale line"));
                }
                let value = match tokens.as_slice() {
                    [_, Token::Bare(v)] => v
                        .parse::<f64>()
                        .map_err(|_| ParseError::new(line, format!("invalid scale '{v}'")))?,
                    _ => return Err(ParseError::new(line, "expected 'scale <factor>'")),
                };
                if !value.is_finite() || value <= 0.0 {
                    return Err(ParseError::new(line, format!("scale must be positive, got {value}")));
                }
                scale = Some(value);
            }
            "sprite" => {
                let path = match tokens.get(1) {
                    Some(Token::Quoted(p)) => p.clone(),
                    _ => return Err(ParseError::new(line, "sprite path must be double-quoted")),
                };
                let has_trim = match tokens.len() {
                    4 => false,
                    6 => true,
                    _ => return Err(ParseError::new(line, "expected 'sprite \"<path>\" <x>,<y> <w>,<h>'")),
                };
                if trim_seen.is_some_and(|t| t != has_trim) {
                    return Err(ParseError::new(line, "trim fields must be present on every sprite or none"));
                }
                trim_seen = Some(has_trim);
                let (x, y) = parse_pair(tokens.get(2), "sprite position", line)?;
                let (w, h) = parse_pair(tokens.get(3), "sprite size", line)?;
                let trim = if has_trim {
                    let (left, top) = parse_pair(tokens.get(4), "trim offsets", line)?;
                    let (right, bottom) = parse_pair(tokens.get(5), "trim offsets", line)?;
                    Trim::new(left, top, right, bottom)
                } else {
                    Trim::default()
                };
                sprites.push(Sprite {
                    path,
                    w,
                    h,
                    trim,
                    x,
                    y,
                });
            }
            other => return Err(ParseError::new(line, format!("unknown directive '{other}'"))),
        }
    }

    let (width, height) = atlas.ok_or_else(|| ParseError::new(0, "missing atlas line"))?;
    Ok(Layout {
        width,
        height,
        scale: scale.unwrap_or(1.0),
        trim: trim_seen.unwrap_or(false),
        sprites,
    })
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_layout(self))
    }
}

impl FromStr for Layout {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_layout(s)
    }
}
