use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/functions.gopa";
const EXPECTED: Expected = Expected {
    stdout: "factorial of 5 is 120\n",
    stderr: "",
};

#[test]
fn run_functions() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), "", EXPECTED)
}
