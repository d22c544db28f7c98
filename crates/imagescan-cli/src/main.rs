use clap::Parser;
use log::info;

use imagescan_core::fetch::falcon::FalconClient;
use imagescan_core::rules::resolve::ScanStatus;
use imagescan_core::runtime::{ContainerRuntime, detect_runtime};
use imagescan_core::{Outcome, ScanError, report_failure, run};

mod args;
mod logging;

fn main() {
    let args = match args::Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Usage errors are script failures; --help and --version are not.
            let code = if e.use_stderr() {
                ScanStatus::ScriptFailure.exit_code()
            } else {
                0
            };
            std::process::exit(code);
        }
    };

    logging::init(args.log_level);

    let code = match execute(args) {
        Ok(outcome) => {
            if let Outcome::Plugin(json) = &outcome {
                println!("{json}");
            }
            outcome.exit_code()
        }
        Err(e) => report_failure(&e).exit_code(),
    };

    std::process::exit(code);
}

fn execute(args: args::Args) -> Result<Outcome, ScanError> {
    let config = args.into_config()?;

    let runtime = if config.skip_push {
        None
    } else {
        let runtime = detect_runtime()?;
        info!("Using {} container runtime", runtime.kind());
        Some(runtime)
    };

    let client = FalconClient::new(&config)?;
    run(
        &config,
        runtime.as_ref().map(|r| r as &dyn ContainerRuntime),
        &client,
    )
}
