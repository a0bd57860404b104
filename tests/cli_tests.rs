#[test]
fn repackage_cli_tests() {
    trycmd::TestCases::new().case("tests/cmd/repackage/*.toml");
}

#[test]
fn validate_cli_tests() {
    trycmd::TestCases::new().case("tests/cmd/validate/*.toml");
}
