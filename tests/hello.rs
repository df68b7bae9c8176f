use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/hello.gopa";
const EXPECTED: Expected = Expected {
    stdout: "Hello, World!\n",
    stderr: "",
};

#[test]
fn run_hello() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), "", EXPECTED)
}
