use std::{error::Error, process::Command};

/// Runs the bundled `tests/cases/*.gopa` vs `tests/expected/*.txt` suite
/// through the `gopa test` subcommand itself, so the conformance harness is
/// exercised by `cargo test` as well as by hand.
#[test]
fn gopa_test_subcommand_passes() -> Result<(), Box<dyn Error>> {
    let output = Command::new("./target/debug/gopa").arg("test").output()?;

    println!("{}", String::from_utf8_lossy(&output.stdout));
    eprintln!("{}", String::from_utf8_lossy(&output.stderr));
    assert!(
        output.status.success(),
        "gopa test exited with status {:?}",
        output.status.code()
    );

    Ok(())
}
