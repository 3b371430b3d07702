//! Go `text/template` compatible renderer.
//!
//! Supports text, `{{ pipeline }}` actions with trim markers, comments,
//! `if`/`else if`/`else`/`end`, parenthesised pipelines and a small set of
//! built-in functions. Rendering is pure: the same template
//! and [`RenderContext`] always produce the same bytes.
//!
//! Every field reference is resolved before evaluation starts, including
//! references inside branches that will not be taken.
mod context;
mod eval;
mod funcs;
mod lexer;
mod parser;
mod value;

pub use context::RenderContext;
pub use value::Value;

use crate::error::TemplateError;
use parser::Node;

/// A parsed template ready to render against any context.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] when the text is malformed.
    pub fn parse(name: &str, text: &str) -> Result<Self, TemplateError> {
        let items = lexer::lex(name, text)?;
        let nodes = parser::parse(name, items)?;
        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    /// Name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check that every variable the template references exists in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UndefinedVariable`] for the first unresolved
    /// reference.
    pub fn check(&self, ctx: &RenderContext) -> Result<(), TemplateError> {
        eval::check(&self.name, &self.nodes, ctx)
    }

    /// Render against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error for undefined variables or failing function calls.
    pub fn render(&self, ctx: &RenderContext) -> Result<String, TemplateError> {
        self.check(ctx)?;
        let mut out = String::new();
        eval::Evaluator::new(&self.name, ctx).nodes(&self.nodes, &mut out)?;
        Ok(out)
    }
}

/// Parse and render `text` in one step.
///
/// # Errors
///
/// Returns any parse or evaluation error.
pub fn render(name: &str, text: &str, ctx: &RenderContext) -> Result<String, TemplateError> {
    Template::parse(name, text)?.render(ctx)
}

/// Produce the target bytes of a source file.
///
/// Non-templates pass through unchanged; templates must be UTF-8.
///
/// # Errors
///
/// Returns an error when a template is not UTF-8 or fails to render.
pub fn render_entry(
    name: &str,
    raw: &[u8],
    is_template: bool,
    ctx: &RenderContext,
) -> Result<Vec<u8>, TemplateError> {
    if !is_template {
        return Ok(raw.to_vec());
    }
    let text = std::str::from_utf8(raw).map_err(|e| TemplateError::Syntax {
        template: name.to_string(),
        line: 1,
        message: format!("template is not valid UTF-8: {e}"),
    })?;
    render(name, text, ctx).map(String::into_bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::platform::{Os, Platform};

    fn ctx(os: Os, extra_flags: &[(&str, bool)]) -> RenderContext {
        let platform = Platform::new(os, false, "ws1.example.org", PathBuf::from("/home/u"));
        let flags = platform
            .builtin_flags()
            .into_iter()
            .chain(extra_flags.iter().map(|(k, v)| ((*k).to_string(), *v)));
        RenderContext::new(
            &platform,
            flags,
            BTreeMap::from([
                ("base".to_string(), "#1e1e2e".to_string()),
                ("text".to_string(), "#cdd6f4".to_string()),
            ]),
            BTreeMap::from([("email".to_string(), Value::Str("me@example.com".into()))]),
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    #[test]
    fn bashrc_scenario_linux() {
        let src = "{{ if .is_linux }}alias ls='ls --color=auto'{{ end }}\n";
        let out = render("hidden_bashrc.tmpl", src, &ctx(Os::Linux, &[])).unwrap();
        assert_eq!(out, "alias ls='ls --color=auto'\n");
    }

    #[test]
    fn bashrc_scenario_macos() {
        let src = "{{ if .is_linux }}alias ls='ls --color=auto'{{ end }}\n";
        let out = render("hidden_bashrc.tmpl", src, &ctx(Os::Darwin, &[])).unwrap();
        assert_eq!(out, "\n");
    }

    #[test]
    fn else_if_chain_with_pipelines() {
        let src = "\
# profile
{{- if eq .os \"darwin\" }}
export BROWSER=open
{{- else if and .is_linux (not .is_wsl) }}
export BROWSER=xdg-open
{{- else }}
export BROWSER=wslview
{{- end }}
# {{ .email | upper }}
colors: {{ .palette.base }} on {{ .palette.text | trimPrefix \"#\" }}
";
        let out = render("profile.tmpl", src, &ctx(Os::Linux, &[])).unwrap();
        insta::assert_snapshot!(out, @r"
        # profile
        export BROWSER=xdg-open
        # ME@EXAMPLE.COM
        colors: #1e1e2e on cdd6f4
        ");
    }

    #[test]
    fn comments_and_trim_leave_no_blank_lines() {
        let src = "a\n{{- /* dropped */ -}}\nb\n";
        assert_eq!(render("t", src, &ctx(Os::Linux, &[])).unwrap(), "ab\n");
    }

    #[test]
    fn detected_flags_are_booleans() {
        let src = "{{ if .is_nasa }}proxy on{{ else }}proxy off{{ end }}";
        assert_eq!(
            render("t", src, &ctx(Os::Linux, &[("is_nasa", true)])).unwrap(),
            "proxy on"
        );
        assert_eq!(
            render("t", src, &ctx(Os::Linux, &[("is_nasa", false)])).unwrap(),
            "proxy off"
        );
    }

    #[test]
    fn render_is_deterministic() {
        let src = "{{ .hostname }} {{ .os }} {{ join \",\" .home .email }}";
        let c = ctx(Os::Linux, &[]);
        let first = render("t", src, &c).unwrap();
        for _ in 0..10 {
            assert_eq!(render("t", src, &c).unwrap(), first);
        }
        assert_eq!(first, "ws1.example.org linux /home/u,me@example.com");
    }

    #[test]
    fn non_template_passes_through() {
        let raw = b"{{ not a template }}\xff";
        let out = render_entry("bin", raw, false, &ctx(Os::Linux, &[])).unwrap();
        assert_eq!(out, raw);
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn undefined_variable_is_an_error() {
        let err = render("t", "x={{ .nope }}", &ctx(Os::Linux, &[])).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UndefinedVariable {
                template: "t".into(),
                line: 1,
                variable: "nope".into(),
            }
        );
    }

    #[test]
    fn undefined_variable_in_untaken_branch_is_an_error() {
        let src = "{{ if .is_macos }}\n\n{{ .palette.missing }}{{ end }}";
        let err = render("t", src, &ctx(Os::Linux, &[])).unwrap_err();
        assert_eq!(err.to_string(), "t:3: undefined variable '.palette.missing'");
    }

    #[test]
    fn syntax_error_carries_line() {
        let err = Template::parse("cfg.tmpl", "ok\nok\n{{ if .a }}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { line: 3, .. }), "{err}");
        assert_eq!(err.template(), "cfg.tmpl");
    }

    #[test]
    fn printing_a_map_is_a_call_error() {
        let err = render("t", "{{ .palette }}", &ctx(Os::Linux, &[])).unwrap_err();
        assert!(matches!(err, TemplateError::Call { .. }), "{err}");
    }

    #[test]
    fn bad_function_arguments_are_reported() {
        let err = render("t", "{{ eq .os 1 }}", &ctx(Os::Linux, &[])).unwrap_err();
        assert!(err.to_string().contains("error calling eq"), "{err}");
    }

    #[test]
    fn invalid_utf8_template_is_rejected() {
        assert!(render_entry("t", b"\xff", true, &ctx(Os::Linux, &[])).is_err());
    }
}
