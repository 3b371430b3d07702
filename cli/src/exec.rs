//! Running helper programs during host detection.
use anyhow::{Context as _, Result, bail};
use std::process::Command;

/// Runs a program and captures its standard output.
pub trait Executor: Send + Sync {
    /// Run `program` with `args` and return stdout with surrounding
    /// whitespace trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned, exits non-zero, or
    /// prints something other than UTF-8.
    fn capture(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// [`Executor`] that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn capture(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("spawning {program}"))?;
        if !output.status.success() {
            bail!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8(output.stdout)
            .with_context(|| format!("{program} printed invalid UTF-8"))?;
        Ok(stdout.trim().to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn captures_trimmed_stdout() {
        assert_eq!(SystemExecutor.capture("echo", &["  hi  "]).unwrap(), "hi");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let err = SystemExecutor.capture("false", &[]).unwrap_err();
        assert!(err.to_string().starts_with("false exited with"), "{err}");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = SystemExecutor
            .capture("dotrender-no-such-program", &[])
            .unwrap_err();
        assert!(err.to_string().contains("spawning"), "{err}");
    }
}
