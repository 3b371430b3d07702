#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for planning and applying a source tree.
//!
//! Each test lays out a throwaway repository, builds the plan exactly as the
//! `apply` command does and executes it against a temporary destination.

mod common;

use std::sync::Arc;

use common::{CapturingLog, TestRepo};
use dotrender::commands::{apply, diff, managed};
use dotrender::platform::Os;
use dotrender::processing::Context;

const HIDDEN_TOKEN: &str = "[prefixes]\n\"hidden_\" = \"hidden\"\n";
const BASHRC: &str = "{{ if .is_linux }}alias ls='ls --color=auto'{{ end }}\n";

fn run_apply(repo: &TestRepo, dry_run: bool) -> anyhow::Result<dotrender::processing::ApplyReport> {
    let log = Arc::new(CapturingLog::default());
    let plan = repo.plan(log.as_ref(), false)?;
    let ctx = Context::new(log, dry_run);
    apply::execute(&ctx, &plan)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[test]
fn hidden_bashrc_on_linux() {
    let repo = TestRepo::new()
        .config(HIDDEN_TOKEN)
        .source("hidden_bashrc.tmpl", BASHRC);
    run_apply(&repo, false).unwrap();
    assert_eq!(repo.read_target(".bashrc"), "alias ls='ls --color=auto'\n");
    assert_eq!(repo.destination_listing(), vec![".bashrc"]);
}

#[test]
fn hidden_bashrc_on_macos() {
    let repo = TestRepo::new()
        .config(HIDDEN_TOKEN)
        .source("hidden_bashrc.tmpl", BASHRC)
        .on(Os::Darwin);
    run_apply(&repo, false).unwrap();
    assert_eq!(repo.read_target(".bashrc"), "\n");
}

#[test]
fn data_and_palette_reach_templates() {
    let repo = TestRepo::new()
        .config(
            r##"
[palette]
base = "#1e1e2e"

[data]
email = "me@example.com"

[flags]
work_machine = true
"##,
        )
        .source(
            "dot_gitconfig.tmpl",
            "[user]\n\temail = {{ .email }}\n{{- if .work_machine }}\n[http]\n\tproxy = on\n{{- end }}\n",
        )
        .source("dot_config/kitty.conf.tmpl", "background {{ .palette.base }}\n");
    run_apply(&repo, false).unwrap();
    assert_eq!(
        repo.read_target(".gitconfig"),
        "[user]\n\temail = me@example.com\n[http]\n\tproxy = on\n"
    );
    assert_eq!(repo.read_target(".config/kitty.conf"), "background #1e1e2e\n");
}

#[cfg(unix)]
#[test]
fn attributes_set_permission_bits() {
    use std::os::unix::fs::PermissionsExt;

    let repo = TestRepo::new()
        .source("dot_local/bin/executable_greet", "#!/bin/sh\necho hi\n")
        .source("private_dot_ssh/config", "Host *\n");
    run_apply(&repo, false).unwrap();

    let mode = |p: &str| {
        std::fs::metadata(repo.target(p))
            .unwrap()
            .permissions()
            .mode()
            & 0o777
    };
    assert_eq!(mode(".local/bin/greet"), 0o755);
    assert_eq!(mode(".ssh"), 0o700);
    assert_eq!(mode(".ssh/config"), 0o644);
}

// ---------------------------------------------------------------------------
// Idempotency and dry run
// ---------------------------------------------------------------------------

#[test]
fn second_apply_changes_nothing() {
    let repo = TestRepo::new()
        .source("dot_bashrc", "export EDITOR=vi\n")
        .source("dot_config/nvim/init.lua", "vim.o.number = true\n");
    let first = run_apply(&repo, false).unwrap();
    assert_eq!(first.changed.len(), 4);

    let second = run_apply(&repo, false).unwrap();
    assert!(second.changed.is_empty());
    assert_eq!(second.unchanged.len(), 4);
}

#[test]
fn dry_run_leaves_destination_empty() {
    let repo = TestRepo::new().source("dot_bashrc", "x\n");
    let report = run_apply(&repo, true).unwrap();
    assert_eq!(report.summary(), "1 would change, 0 already ok");
    assert!(repo.destination_listing().is_empty());
}

#[test]
fn diff_then_apply_then_no_diff() {
    let repo = TestRepo::new().source("dot_profile", "export PATH=$HOME/bin:$PATH\n");
    let log = CapturingLog::default();

    let before = diff::render(&repo.plan(&log, false).unwrap()).unwrap();
    assert!(before.contains("+export PATH=$HOME/bin:$PATH"), "{before}");

    run_apply(&repo, false).unwrap();
    let after = diff::render(&repo.plan(&log, false).unwrap()).unwrap();
    assert_eq!(after, "");
}

#[test]
fn managed_lists_targets_in_order() {
    let repo = TestRepo::new()
        .source("dot_config/git/config", "")
        .source("dot_bashrc", "");
    let plan = repo.plan(&CapturingLog::default(), false).unwrap();
    assert_eq!(
        managed::managed_targets(&plan),
        vec![".bashrc", ".config", ".config/git", ".config/git/config"]
    );
}

// ---------------------------------------------------------------------------
// Validation happens before any write
// ---------------------------------------------------------------------------

#[test]
fn duplicate_target_detected_before_any_write() {
    let repo = TestRepo::new()
        .config(HIDDEN_TOKEN)
        .source("dot_aaa", "written first if planning were lazy\n")
        .source("dot_bashrc", "a\n")
        .source("hidden_bashrc.tmpl", "b\n");

    let err = run_apply(&repo, false).unwrap_err();
    assert!(err.to_string().contains("'.bashrc'"), "{err}");
    assert!(repo.destination_listing().is_empty());
}

#[test]
fn template_errors_are_reported_together() {
    let repo = TestRepo::new()
        .source("dot_a.tmpl", "{{ .undefined_a }}")
        .source("dot_b.tmpl", "{{ if .is_linux }}unterminated")
        .source("dot_c", "fine");
    let log = CapturingLog::default();

    let err = repo.plan(&log, false).unwrap_err();
    assert_eq!(err.to_string(), "2 template(s) failed to render");
    assert!(log.contains("dot_a.tmpl:1: undefined variable '.undefined_a'"));
    assert!(log.contains("dot_b.tmpl"));
    assert!(repo.destination_listing().is_empty());
}

#[test]
fn conflicting_variable_names_fail_configuration() {
    let repo = TestRepo::new().config("[flags]\nos = true\n");
    let err = repo.setup(&CapturingLog::default()).unwrap_err();
    assert!(format!("{err:#}").contains("os"), "{err:#}");
}

#[test]
fn blocked_target_stops_with_report() {
    let repo = TestRepo::new()
        .source("dot_a", "1")
        .source("dot_b", "2")
        .source("dot_c", "3");
    std::fs::create_dir(repo.target(".b")).unwrap();

    let err = run_apply(&repo, false).unwrap_err();
    let apply_err = err
        .downcast_ref::<dotrender::error::ApplyError>()
        .expect("apply error");
    assert_eq!(
        apply_err.report().summary(),
        "1 changed, 0 already ok, 1 failed, 1 not attempted"
    );
    assert!(repo.target(".a").exists());
    assert!(!repo.target(".c").exists());
}
