use std::{
    error::Error,
    io,
    path::Path,
    process::{Command, Output},
    str,
};

const GOPA_PATH: &str = "./target/debug/gopa";

pub struct Expected<'a> {
    pub stdout: &'a str,
    pub stderr: &'a str,
}

impl<'a> Expected<'a> {
    fn assert_matches(self, output: &Output) -> Result<(), Box<dyn Error>> {
        assert_eq!(str::from_utf8(&output.stdout)?, self.stdout);
        assert_eq!(str::from_utf8(&output.stderr)?, self.stderr);
        Ok(())
    }
}

fn run_gopa(src_path: &Path, perm: &str, debug: bool) -> Result<Output, io::Error> {
    let mut cmd = Command::new(GOPA_PATH);
    cmd.arg("run").arg(src_path).arg("--perm").arg(perm);
    if debug {
        cmd.arg("--debug");
    }
    cmd.output()
}

/// Runs a `.gopa` file through the `gopa` binary with the given comma-separated
/// permission grant and asserts its captured stdout/stderr match `expected`.
pub fn check_run(src_path: &Path, perm: &str, expected: Expected) -> Result<(), Box<dyn Error>> {
    let output = run_gopa(src_path, perm, false)?;

    expected.assert_matches(&output)?;
    assert!(
        output.status.success(),
        "gopa exited with status {:?}",
        output.status.code()
    );

    Ok(())
}

/// Like `check_run`, but runs with `--debug` and asserts the process exits
/// with a non-zero status (used for permission-denial and runtime-error
/// fixtures, which a non-debug run would otherwise catch and print per
/// statement without failing the process).
pub fn check_run_fails(src_path: &Path, perm: &str) -> Result<(), Box<dyn Error>> {
    let output = run_gopa(src_path, perm, true)?;

    println!("{output:?}");
    assert!(
        !output.status.success(),
        "gopa should have exited with a non-zero status"
    );

    Ok(())
}
