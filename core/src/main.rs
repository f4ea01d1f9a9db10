use engine_verify_core::logging::init_logging;
use engine_verify_core::run_installation_check;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let mut stdout = std::io::stdout().lock();
    let outcome = run_installation_check(&mut stdout).await;
    ExitCode::from(outcome.exit_code())
}
