use std::process::ExitCode;

fn main() -> ExitCode {
    islandhop_cli::run()
}
