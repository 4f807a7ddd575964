use std::process::ExitCode;

#[expect(
    clippy::print_stderr,
    reason = "failures before telemetry is installed have no other sink"
)]
fn main() -> ExitCode {
    match courierd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("courierd: {error}");
            ExitCode::FAILURE
        }
    }
}
