use std::process::ExitCode;

fn main() -> ExitCode {
    guardchat_cli::run()
}
