use std::process::ExitCode;

fn main() -> ExitCode {
    weeklybot_cli::run()
}
