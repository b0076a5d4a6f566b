use std::process::ExitCode;

fn main() -> ExitCode {
    fernwood_cli::run()
}
