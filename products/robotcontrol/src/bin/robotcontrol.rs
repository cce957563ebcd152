use {
    base::*,
    clap::Parser,
    robotcontrol::{Args, Config, Lifecycle},
    std::process::ExitCode,
};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    match &args.log_dir {
        Some(dir) => init_file_logger(dir, args.log_level)?,
        None => init_stdout_logger(args.log_level),
    }

    let config = Config::from_args(&args)?;
    let lifecycle = match Lifecycle::start(&config).await {
        Ok(lifecycle) => lifecycle,
        Err(error) => {
            log_fatal!("startup failed: {}", error);
        }
    };

    let report = lifecycle.run().await;
    if report.is_fault() {
        log::error!("exiting after {}", report.reason);
    } else {
        log::info!("done");
    }
    Ok(ExitCode::from(report.exit_code()))
}
