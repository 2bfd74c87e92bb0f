// src/main.rs

use dockship::{cli, logging, peek_log_level, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("dockship error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let config_level = peek_log_level(&args);
    logging::init_logging(args.log_level, args.verbose, config_level.as_deref())?;
    run(args).await?;
    Ok(())
}
