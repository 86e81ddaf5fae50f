use {
    clap::Parser,
    deployer::{Output, arguments::Arguments},
    std::process::ExitCode,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Values from a `.env` file never override the real environment.
    dotenv::dotenv().ok();
    let args = Arguments::parse();
    observe::tracing::initialize(&observe::Config::new(
        &args.logging.log_filter,
        args.logging.log_json,
    ));
    deployer::observe::metrics::init();
    tracing::info!("running deployer with validated arguments:\n{}", args);

    let result = deployer::run(&args).await;
    let exported = match &args.metrics_path {
        Some(path) => deployer::export_metrics(path).await,
        None => Ok(()),
    };
    if let Err(err) = exported {
        tracing::warn!(?err, "failed to export metrics");
    }

    match result {
        Ok(Output::Deployed(record)) => {
            match record.deployed_address {
                Some(address) => println!("{address}"),
                None => {
                    tracing::error!(?record, "confirmed deployment without address");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Ok(Output::Pending(records)) => {
            for record in records {
                match serde_json::to_string(&record) {
                    Ok(line) => println!("{line}"),
                    Err(err) => {
                        tracing::error!(?err, "failed to encode deployment record");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(?err, "deployer failed");
            ExitCode::FAILURE
        }
    }
}
