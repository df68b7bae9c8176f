use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/package.gopa";
const EXPECTED: Expected = Expected {
    stdout: "ababab\n",
    stderr: "",
};

#[test]
fn run_bundled_package() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), "packages", EXPECTED)
}
