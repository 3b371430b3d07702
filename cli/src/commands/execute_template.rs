//! Execute-template command: render ad-hoc templates against the namespace.
use anyhow::{Context as _, Result};
use std::io::Read as _;
use std::sync::Arc;

use crate::cli::{ExecuteTemplateOpts, GlobalOpts};
use crate::error::TemplateError;
use crate::logging::Logger;
use crate::template::{self, RenderContext};

/// Where template text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateInput {
    /// Command-line arguments, each rendered on its own line.
    Arguments(Vec<String>),
    /// One named template (a file or stdin), rendered as-is.
    Text {
        /// Name used in diagnostics.
        name: String,
        /// Template text.
        text: String,
    },
}

/// Run the execute-template command.
///
/// # Errors
///
/// Returns an error if configuration fails to load, the input cannot be
/// read, or a template fails to render.
pub fn run(global: &GlobalOpts, opts: &ExecuteTemplateOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let input = read_input(opts)?;
    let output = render_input(&setup.context, &input)?;
    super::emit(&output)
}

fn read_input(opts: &ExecuteTemplateOpts) -> Result<TemplateInput> {
    if let Some(path) = &opts.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading template {}", path.display()))?;
        return Ok(TemplateInput::Text {
            name: path.display().to_string(),
            text,
        });
    }
    if !opts.templates.is_empty() {
        return Ok(TemplateInput::Arguments(opts.templates.clone()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading template from stdin")?;
    Ok(TemplateInput::Text {
        name: "stdin".to_string(),
        text,
    })
}

/// Render `input` against `ctx`.
///
/// # Errors
///
/// Returns the first template error.
pub fn render_input(ctx: &RenderContext, input: &TemplateInput) -> Result<String, TemplateError> {
    match input {
        TemplateInput::Arguments(args) => {
            let mut out = String::new();
            for (index, arg) in args.iter().enumerate() {
                out.push_str(&template::render(&format!("arg{}", index + 1), arg, ctx)?);
                out.push('\n');
            }
            Ok(out)
        }
        TemplateInput::Text { name, text } => template::render(name, text, ctx),
    }
}
