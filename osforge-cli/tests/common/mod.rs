use assert_cmd::Command;

/// A command for the osforge binary under test.
pub fn osforge() -> Command {
    Command::new(env!("CARGO_BIN_EXE_osforge"))
}
