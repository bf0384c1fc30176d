use std::process::ExitCode;

fn main() -> ExitCode {
    fixquote_cli::run()
}
