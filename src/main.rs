// src/main.rs

use phasegraph::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("phasegraph error: {err:?}");
            std::process::exit(2);
        }
    }
}

/// `Ok(false)` when at least one operation failed.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let Some(report) = run(args).await? else {
        return Ok(true);
    };
    println!("{}", report.render_summary());
    Ok(report.is_success())
}
