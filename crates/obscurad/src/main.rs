use std::process::ExitCode;

fn main() -> ExitCode {
    match obscurad::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed yet when launch fails early,
            // so the error also goes to stderr directly.
            eprintln!("obscurad: {error}");
            ExitCode::FAILURE
        }
    }
}
