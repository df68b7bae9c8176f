use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/closures.gopa";
const EXPECTED: Expected = Expected {
    stdout: "Hello, World!\n",
    stderr: "",
};

#[test]
fn run_closures() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), "", EXPECTED)
}
