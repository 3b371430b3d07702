//! Template evaluation and the up-front variable check.
use super::context::RenderContext;
use super::funcs;
use super::parser::{Node, Operand, Pipeline};
use super::value::Value;
use crate::error::TemplateError;

/// Verify that every field reference resolves, in every branch.
pub(super) fn check(name: &str, nodes: &[Node], ctx: &RenderContext) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Output(pipeline) => check_pipeline(name, pipeline, ctx)?,
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    check_pipeline(name, &branch.condition, ctx)?;
                    check(name, &branch.body, ctx)?;
                }
                if let Some(body) = otherwise {
                    check(name, body, ctx)?;
                }
            }
        }
    }
    Ok(())
}

fn check_pipeline(
    name: &str,
    pipeline: &Pipeline,
    ctx: &RenderContext,
) -> Result<(), TemplateError> {
    for operand in pipeline.commands.iter().flat_map(|c| &c.operands) {
        match operand {
            Operand::Field(path) if !path.is_empty() && ctx.lookup(path).is_none() => {
                return Err(undefined(name, pipeline.line, path));
            }
            Operand::Group(inner) => check_pipeline(name, inner, ctx)?,
            _ => {}
        }
    }
    Ok(())
}

fn undefined(name: &str, line: usize, path: &[String]) -> TemplateError {
    TemplateError::UndefinedVariable {
        template: name.to_string(),
        line,
        variable: path.join("."),
    }
}

/// Walks the tree, appending output to a buffer.
pub(super) struct Evaluator<'a> {
    name: &'a str,
    ctx: &'a RenderContext,
}

impl<'a> Evaluator<'a> {
    pub(super) const fn new(name: &'a str, ctx: &'a RenderContext) -> Self {
        Self { name, ctx }
    }

    pub(super) fn nodes(&self, nodes: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(pipeline) => {
                    let value = self.pipeline(pipeline)?;
                    let text = value
                        .to_text()
                        .map_err(|message| self.call_error(pipeline.line, message))?;
                    out.push_str(&text);
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for branch in branches {
                        if self.pipeline(&branch.condition)?.is_truthy() {
                            taken = Some(&branch.body);
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_ref()) {
                        self.nodes(body, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn pipeline(&self, pipeline: &Pipeline) -> Result<Value, TemplateError> {
        let line = pipeline.line;
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            let mut operands = command.operands.iter();
            let value = match operands.next() {
                Some(Operand::Func(func)) => {
                    let mut args = operands
                        .map(|operand| self.operand(operand, line))
                        .collect::<Result<Vec<_>, _>>()?;
                    args.extend(piped.take());
                    let f = funcs::lookup(func).ok_or_else(|| {
                        self.call_error(line, format!("function \"{func}\" not defined"))
                    })?;
                    f(&args).map_err(|message| {
                        self.call_error(line, format!("error calling {func}: {message}"))
                    })?
                }
                Some(operand) => self.operand(operand, line)?,
                None => return Err(self.call_error(line, "empty command".to_string())),
            };
            piped = Some(value);
        }
        piped.ok_or_else(|| self.call_error(line, "empty pipeline".to_string()))
    }

    fn operand(&self, operand: &Operand, line: usize) -> Result<Value, TemplateError> {
        match operand {
            Operand::Field(path) if path.is_empty() => {
                Ok(Value::Map(self.ctx.namespace().clone()))
            }
            Operand::Field(path) => self
                .ctx
                .lookup(path)
                .cloned()
                .ok_or_else(|| undefined(self.name, line, path)),
            Operand::Str(s) => Ok(Value::Str(s.clone())),
            Operand::Int(n) => Ok(Value::Int(*n)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::Group(inner) => self.pipeline(inner),
            Operand::Func(func) => Err(self.call_error(
                line,
                format!("function \"{func}\" must be called in parentheses"),
            )),
        }
    }

    fn call_error(&self, line: usize, message: String) -> TemplateError {
        TemplateError::Call {
            template: self.name.to_string(),
            line,
            message,
        }
    }
}
