use std::process::ExitCode;

fn main() -> ExitCode {
    agendum_cli::run()
}
