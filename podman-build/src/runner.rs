use std::{ffi::OsStr, path::Path};

use log::debug;

use crate::process::{self, ExecutionError};

/// Runs an external program and returns its standard output as lines.
pub trait CommandRunner {
    fn run(
        &self,
        working_dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<Vec<String>, ExecutionError>;
}

/// Runs commands as child processes. Blocks until the child exits, there is no timeout.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        working_dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<Vec<String>, ExecutionError> {
        let output = process::Command::new(program)
            .args(args.iter().map(OsStr::new))
            .current_dir(working_dir)
            .try_output()?;

        for line in output.stderr_lines() {
            debug!("{program}: {line}");
        }

        let output = output.require_success()?;
        Ok(output.stdout_lines())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::ErrorKind;

    #[test]
    fn test_run_returns_stdout_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();

        let lines = ProcessRunner
            .run(dir.path(), "sh", &["-c", "ls; echo sha256:abcd1234"])
            .unwrap();

        assert_eq!(lines, ["marker", "sha256:abcd1234"]);
    }

    #[test]
    fn test_run_fails_on_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();

        let error = ProcessRunner
            .run(dir.path(), "sh", &["-c", "echo out; echo nope >&2; exit 1"])
            .unwrap_err();

        assert!(matches!(
            error.kind,
            ErrorKind::NonZeroExitStatus { ref stderr, .. } if stderr == "nope"
        ));
    }

    #[test]
    fn test_run_fails_when_program_is_missing() {
        let dir = tempfile::tempdir().unwrap();

        let error = ProcessRunner
            .run(dir.path(), "podman-build-test-missing-program", &[])
            .unwrap_err();

        assert!(matches!(error.kind, ErrorKind::NotFound));
    }
}
