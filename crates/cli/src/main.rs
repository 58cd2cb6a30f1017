use std::process::ExitCode;

fn main() -> ExitCode {
    outbound_cli::run()
}
