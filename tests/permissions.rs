use std::{error::Error, path::Path};

use test_utils::check_run_fails;

const SRC_PATH: &str = "./demos/permissions.gopa";

#[test]
fn network_without_grant_is_denied() -> Result<(), Box<dyn Error>> {
    check_run_fails(Path::new(SRC_PATH), "")
}
