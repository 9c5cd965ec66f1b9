// src/main.rs

use mdensemble::{cli, config, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("mdensemble error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let cfg = config::load_and_validate(&args.config)?;

    if args.dry_run {
        logging::init_logging(args.log_level, None)?;
    } else {
        std::fs::create_dir_all(&cfg.output_dir)?;
        config::dump_params(&cfg)?;
        logging::init_logging(args.log_level, Some(&cfg.log_file()))?;
    }

    let summary = run(args, cfg).await?;
    if summary.interrupted {
        anyhow::bail!("run interrupted with {} task(s) unresolved", summary.submitted - summary.completed);
    }
    Ok(())
}
