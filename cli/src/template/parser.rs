//! Builds the template syntax tree from lexed items.
use super::funcs;
use super::lexer::{Item, Token};
use crate::error::TemplateError;

/// A node in the parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Node {
    Text(String),
    Output(Pipeline),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Self>>,
    },
}

/// One `if` or `else if` arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Branch {
    pub condition: Pipeline,
    pub body: Vec<Node>,
}

/// Commands separated by `|`; the output of each feeds the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Pipeline {
    pub line: usize,
    pub commands: Vec<Command>,
}

/// A function call or a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Command {
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Operand {
    Field(Vec<String>),
    Str(String),
    Int(i64),
    Bool(bool),
    Func(String),
    Group(Pipeline),
}

const UNSUPPORTED_ACTIONS: &[&str] = &[
    "range", "with", "define", "template", "block", "break", "continue",
];

enum Terminator {
    Eof,
    End,
    Else {
        line: usize,
        condition: Option<Pipeline>,
    },
}

/// Parse lexed items into a node list.
pub(super) fn parse(name: &str, items: Vec<Item>) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        name,
        items: items.into_iter(),
        last_line: 1,
    };
    let (nodes, end) = parser.list()?;
    match end {
        Terminator::Eof => Ok(nodes),
        Terminator::End => Err(parser.error(parser.last_line, "unexpected {{end}}")),
        Terminator::Else { line, .. } => Err(parser.error(line, "unexpected {{else}}")),
    }
}

struct Parser<'a> {
    name: &'a str,
    items: std::vec::IntoIter<Item>,
    last_line: usize,
}

impl Parser<'_> {
    fn error(&self, line: usize, message: &str) -> TemplateError {
        TemplateError::Syntax {
            template: self.name.to_string(),
            line,
            message: message.to_string(),
        }
    }

    fn list(&mut self) -> Result<(Vec<Node>, Terminator), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            let (line, tokens) = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { line, tokens } => (line, tokens),
            };
            self.last_line = line;

            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                _ => "",
            };
            let rest = tokens.get(1..).unwrap_or_default();
            match keyword {
                "end" => {
                    if !rest.is_empty() {
                        return Err(self.error(line, "unexpected tokens after end"));
                    }
                    return Ok((nodes, Terminator::End));
                }
                "else" => {
                    let condition = match rest.split_first() {
                        None => None,
                        Some((Token::Ident(word), cond)) if word == "if" => {
                            Some(self.pipeline(cond, line)?)
                        }
                        Some(_) => {
                            return Err(self.error(line, "expected end or if after else"));
                        }
                    };
                    return Ok((nodes, Terminator::Else { line, condition }));
                }
                "if" => {
                    let condition = self.pipeline(rest, line)?;
                    nodes.push(self.if_node(line, condition)?);
                }
                word if UNSUPPORTED_ACTIONS.contains(&word) => {
                    return Err(self.error(line, &format!("{{{{{word}}}}} is not supported")));
                }
                _ => nodes.push(Node::Output(self.pipeline(&tokens, line)?)),
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn if_node(&mut self, line: usize, first: Pipeline) -> Result<Node, TemplateError> {
        let mut branches = Vec::new();
        let mut condition = first;
        loop {
            let (body, end) = self.list()?;
            branches.push(Branch { condition, body });
            match end {
                Terminator::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    });
                }
                Terminator::Else {
                    condition: Some(next),
                    ..
                } => condition = next,
                Terminator::Else {
                    condition: None, ..
                } => {
                    let (body, end) = self.list()?;
                    return match end {
                        Terminator::End => Ok(Node::If {
                            branches,
                            otherwise: Some(body),
                        }),
                        Terminator::Else { line, .. } => {
                            Err(self.error(line, "{{else}} after final {{else}}"))
                        }
                        Terminator::Eof => Err(self.error(line, "missing {{end}} for {{if}}")),
                    };
                }
                Terminator::Eof => return Err(self.error(line, "missing {{end}} for {{if}}")),
            }
        }
    }

    fn pipeline(&self, tokens: &[Token], line: usize) -> Result<Pipeline, TemplateError> {
        let mut commands = Vec::new();
        let mut operands = Vec::new();
        let mut i = 0;
        while let Some(token) = tokens.get(i) {
            i += 1;
            let operand = match token {
                Token::Pipe => {
                    if operands.is_empty() {
                        return Err(self.error(line, "missing command before |"));
                    }
                    commands.push(Command {
                        operands: std::mem::take(&mut operands),
                    });
                    continue;
                }
                Token::LParen => {
                    let close = matching_paren(tokens, i)
                        .ok_or_else(|| self.error(line, "unclosed left paren"))?;
                    let inner = tokens.get(i..close).unwrap_or_default();
                    i = close + 1;
                    Operand::Group(self.pipeline(inner, line)?)
                }
                Token::RParen => return Err(self.error(line, "unexpected right paren")),
                Token::Field(path) => Operand::Field(path.clone()),
                Token::Str(s) => Operand::Str(s.clone()),
                Token::Int(n) => Operand::Int(*n),
                Token::Ident(word) => match word.as_str() {
                    "true" => Operand::Bool(true),
                    "false" => Operand::Bool(false),
                    "if" | "else" | "end" => {
                        return Err(self.error(line, &format!("unexpected {word} in operand")));
                    }
                    name if funcs::lookup(name).is_some() => Operand::Func(name.to_string()),
                    name => {
                        return Err(
                            self.error(line, &format!("function \"{name}\" not defined"))
                        );
                    }
                },
            };
            operands.push(operand);
        }
        if operands.is_empty() {
            return Err(self.error(line, "missing value for command"));
        }
        commands.push(Command { operands });

        for (position, command) in commands.iter().enumerate() {
            let is_call = matches!(command.operands.first(), Some(Operand::Func(_)));
            if position > 0 && !is_call {
                return Err(self.error(line, "non-function in pipeline stage"));
            }
            if !is_call && command.operands.len() > 1 {
                return Err(self.error(line, "can't give argument to non-function"));
            }
            if command
                .operands
                .iter()
                .skip(1)
                .any(|operand| matches!(operand, Operand::Func(_)))
            {
                return Err(self.error(line, "function argument must be parenthesized"));
            }
        }
        Ok(Pipeline { line, commands })
    }
}

/// Index of the `)` matching a `(` that ends just before `start`.
fn matching_paren(tokens: &[Token], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, token) in tokens.iter().enumerate().skip(start) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}
