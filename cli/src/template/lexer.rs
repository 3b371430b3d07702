//! Splits template text into literal text and action tokens.
//!
//! Trim markers (`{{- ` and ` -}}`) are applied here so the parser only sees
//! already-trimmed text. Comments produce no item at all.
use crate::error::TemplateError;

/// A token inside an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token {
    /// Field path such as `.palette.base`; empty for a bare `.`.
    Field(Vec<String>),
    /// Keyword, function name or boolean literal.
    Ident(String),
    /// Quoted or raw string literal.
    Str(String),
    /// Integer literal.
    Int(i64),
    Pipe,
    LParen,
    RParen,
}

/// A lexed template item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Item {
    Text(String),
    Action { line: usize, tokens: Vec<Token> },
}

/// Tokenize `src`. `name` is only used for error messages.
pub(super) fn lex(name: &str, src: &str) -> Result<Vec<Item>, TemplateError> {
    let mut items = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut trim_next = false;

    while let Some(offset) = src.get(pos..).and_then(|rest| rest.find("{{")) {
        let start = pos + offset;
        let raw_text = src.get(pos..start).unwrap_or_default();
        line += newlines(raw_text);

        let mut text = if trim_next {
            raw_text.trim_start()
        } else {
            raw_text
        };
        let mut cursor = start + 2;
        if is_left_trim(src.get(cursor..).unwrap_or_default()) {
            text = text.trim_end();
            cursor += 1;
        }
        push_text(&mut items, text);

        let action_line = line;
        let lexed = lex_action(name, src, cursor, &mut line)?;
        if let Some(tokens) = lexed.tokens {
            items.push(Item::Action {
                line: action_line,
                tokens,
            });
        }
        trim_next = lexed.trim_right;
        pos = lexed.end;
    }

    let tail = src.get(pos..).unwrap_or_default();
    push_text(&mut items, if trim_next { tail.trim_start() } else { tail });
    Ok(items)
}

struct LexedAction {
    /// `None` for comments.
    tokens: Option<Vec<Token>>,
    /// Byte offset just past the closing delimiter.
    end: usize,
    trim_right: bool,
}

fn lex_action(
    name: &str,
    src: &str,
    mut i: usize,
    line: &mut usize,
) -> Result<LexedAction, TemplateError> {
    let err = |line: usize, message: &str| TemplateError::Syntax {
        template: name.to_string(),
        line,
        message: message.to_string(),
    };

    i = skip_whitespace(src, i, line);
    if src.get(i..).is_some_and(|rest| rest.starts_with("/*")) {
        let body = i + 2;
        let Some(close) = src.get(body..).and_then(|rest| rest.find("*/")) else {
            return Err(err(*line, "unclosed comment"));
        };
        let after = body + close + 2;
        *line += newlines(src.get(i..after).unwrap_or_default());
        let tail = src.get(after..).unwrap_or_default();
        if tail.starts_with("}}") {
            return Ok(LexedAction {
                tokens: None,
                end: after + 2,
                trim_right: false,
            });
        }
        if tail.starts_with(" -}}") {
            return Ok(LexedAction {
                tokens: None,
                end: after + 4,
                trim_right: true,
            });
        }
        return Err(err(*line, "comment ends before closing delimiter"));
    }

    let mut tokens = Vec::new();
    loop {
        let before = i;
        i = skip_whitespace(src, i, line);
        let Some(rest) = src.get(i..).filter(|rest| !rest.is_empty()) else {
            return Err(err(*line, "unclosed action"));
        };
        if rest.starts_with("}}") {
            return Ok(LexedAction {
                tokens: Some(tokens),
                end: i + 2,
                trim_right: false,
            });
        }
        if rest.starts_with("-}}") && i > before {
            return Ok(LexedAction {
                tokens: Some(tokens),
                end: i + 3,
                trim_right: true,
            });
        }

        let Some(c) = rest.chars().next() else {
            return Err(err(*line, "unclosed action"));
        };
        match c {
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let (value, len) = quoted(rest).map_err(|m| err(*line, &m))?;
                tokens.push(Token::Str(value));
                i += len;
            }
            '`' => {
                let Some(close) = rest.get(1..).and_then(|r| r.find('`')) else {
                    return Err(err(*line, "unterminated raw string"));
                };
                let value = rest.get(1..=close).unwrap_or_default();
                *line += newlines(value);
                tokens.push(Token::Str(value.to_string()));
                i += close + 2;
            }
            '.' => {
                let (path, len) = field(rest).map_err(|m| err(*line, &m))?;
                tokens.push(Token::Field(path));
                i += len;
            }
            '-' | '0'..='9' => {
                let len = rest
                    .char_indices()
                    .skip(1)
                    .find(|(_, ch)| !ch.is_ascii_digit())
                    .map_or(rest.len(), |(idx, _)| idx);
                let literal = rest.get(..len).unwrap_or_default();
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| err(*line, &format!("bad number syntax: {literal:?}")))?;
                tokens.push(Token::Int(value));
                i += len;
            }
            '$' => return Err(err(*line, "variables are not supported")),
            c if is_ident_char(c) => {
                let len = ident_len(rest);
                tokens.push(Token::Ident(rest.get(..len).unwrap_or_default().to_string()));
                i += len;
            }
            other => {
                return Err(err(
                    *line,
                    &format!("unexpected {other:?} in action"),
                ));
            }
        }
    }
}

/// Parse a double-quoted string starting at `rest`; returns the value and the
/// number of bytes consumed including both quotes.
fn quoted(rest: &str) -> Result<(String, usize), String> {
    let mut value = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((value, idx + 1)),
            '\n' => break,
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, other)) => return Err(format!("unknown escape sequence \\{other}")),
                None => break,
            },
            c => value.push(c),
        }
    }
    Err("unterminated quoted string".to_string())
}

/// Parse a field path such as `.a.b`; returns the segments and the number of
/// bytes consumed.
fn field(rest: &str) -> Result<(Vec<String>, usize), String> {
    let mut segments = Vec::new();
    let mut i = 0;
    while rest.get(i..).is_some_and(|r| r.starts_with('.')) {
        let tail = rest.get(i + 1..).unwrap_or_default();
        let len = ident_len(tail);
        if len == 0 {
            if segments.is_empty() && i == 0 {
                return Ok((segments, 1));
            }
            return Err(format!("bad field path {:?}", rest.get(..=i).unwrap_or_default()));
        }
        segments.push(tail.get(..len).unwrap_or_default().to_string());
        i += len + 1;
    }
    Ok((segments, i))
}

fn ident_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map_or(s.len(), |(idx, _)| idx)
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_left_trim(after_open: &str) -> bool {
    let mut chars = after_open.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn skip_whitespace(src: &str, mut i: usize, line: &mut usize) -> usize {
    for c in src.get(i..).unwrap_or_default().chars() {
        if !c.is_whitespace() {
            break;
        }
        if c == '\n' {
            *line += 1;
        }
        i += c.len_utf8();
    }
    i
}

fn newlines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}

fn push_text(items: &mut Vec<Item>, text: &str) {
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}
