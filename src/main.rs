use std::process::ExitCode;

fn main() -> ExitCode {
    match epiworld::runner::run_with_args() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("epiworld: {e}");
            ExitCode::FAILURE
        }
    }
}
