use anyhow::{bail, Result};
use clap::Parser;
use mrtree::cmd::mrt::{Args, Commands, ProcessJob};
use mrtree::pipeline::Pipeline;
use mrtree::placement::place_all;
use mrtree::source::generate::generate;
use mrtree::source::DirectorySource;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn process(job: ProcessJob) -> Result<()> {
    let source = DirectorySource::open(&job.files_path)?;
    info!(
        documents = source.files().len(),
        input = %job.files_path.display(),
        "starting run"
    );
    let mut pipeline = Pipeline::from_config(&job.config)?;

    // Dropping the run aborts queued tasks; the scratch store removes
    // whatever they left behind.
    let report = tokio::select! {
        report = pipeline.run(&source) => report,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    };

    if report.is_degraded() {
        warn!(
            failures = report.failures.len(),
            "run finished with task failures, outputs may be partial"
        );
    }
    let outputs = match report.into_outputs() {
        Ok(outputs) => outputs,
        Err(err) => {
            error!("{err}");
            println!("Empty output");
            return Ok(());
        }
    };

    let mut failed = 0;
    for placement in place_all(pipeline.store(), outputs, &job.output_dir) {
        match placement.result {
            Ok(_) => println!("Ok {}", placement.key),
            Err(err) => {
                eprintln!("Failed {}: {}", placement.key, err);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} outputs could not be placed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Args::parse().command {
        Commands::Generate {
            files_path,
            num_docs,
            records_per_doc,
        } => {
            generate(&files_path, num_docs, records_per_doc, &mut rand::rng())?;
        }
        command => {
            if let Some(job) = command.process_job()? {
                process(job).await?;
            }
        }
    }
    Ok(())
}
