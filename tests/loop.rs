use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/loop.gopa";
const EXPECTED: Expected = Expected {
    stdout: "1\n2\n3\n4\n5\n",
    stderr: "",
};

#[test]
fn run_loop() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), "", EXPECTED)
}
