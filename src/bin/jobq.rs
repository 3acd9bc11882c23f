//! jobq CLI: run a synthetic workload through the job queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use jobq::cache::{cache_key, remember};
use jobq::config::Config;
use jobq::event::EventKind;
use jobq::services::Services;
use jobq::telemetry::{TelemetryConfig, init_telemetry};
use jobq::{Error, Job};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "jobq", about = "Bounded in-process job queue")]
struct Cli {
    /// TOML config file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit synthetic jobs, wait for them, and report what happened
    Run {
        /// Number of jobs to submit
        #[arg(long, default_value_t = 20)]
        jobs: usize,
        /// Job name; lockable jobs with the same name never overlap
        #[arg(long, default_value = "synthetic")]
        name: String,
        /// Give every job the same name and mark it lockable
        #[arg(long)]
        lockable: bool,
        /// How long each action sleeps
        #[arg(long, default_value_t = 50)]
        work_ms: u64,
        /// Make every k-th action fail (0 = never)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
        /// Override the configured worker count
        #[arg(long)]
        workers: Option<usize>,
        /// Override the configured channel capacity
        #[arg(long)]
        channel_size: Option<usize>,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Run {
            jobs,
            name,
            lockable,
            work_ms,
            fail_every,
            workers,
            channel_size,
        } => {
            if let Some(workers) = workers {
                config.queue.workers = workers;
            }
            if let Some(channel_size) = channel_size {
                config.queue.channel_size = channel_size;
            }
            let _guard = init_telemetry(TelemetryConfig::from_config(&config, "jobq"))?;
            cmd_run(&config, jobs, name, lockable, work_ms, fail_every).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    })
}

#[derive(Default)]
struct Tally {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    discarded: AtomicUsize,
}

async fn cmd_run(
    config: &Config,
    jobs: usize,
    name: String,
    lockable: bool,
    work_ms: u64,
    fail_every: usize,
) -> anyhow::Result<()> {
    let services = Services::from_config(config)?;

    // Count outcomes from the event stream; the queue itself reports nothing back.
    let tally = Arc::new(Tally::default());
    let mut events = services.queue.subscribe();
    let listener = {
        let tally = Arc::clone(&tally);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let counter = match event.kind {
                            EventKind::Completed { .. } => &tally.completed,
                            EventKind::Failed { .. } => &tally.failed,
                            EventKind::Skipped { .. } => &tally.skipped,
                            EventKind::Discarded { .. } => &tally.discarded,
                            _ => continue,
                        };
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(RecvError::Lagged(n)) => eprintln!("event stream lagged by {n}"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    let mut accepted = 0usize;
    let mut full = 0usize;
    for i in 1..=jobs {
        let job_name = if lockable {
            name.clone()
        } else {
            format!("{name}-{i}")
        };
        let fails = fail_every > 0 && i % fail_every == 0;
        let mut job = Job::new(job_name, move || async move {
            tokio::time::sleep(Duration::from_millis(work_ms)).await;
            if fails {
                anyhow::bail!("synthetic failure in job {i}");
            }
            Ok(())
        });
        if lockable {
            job = job.lockable();
        }
        match services.queue.add_job(job) {
            Ok(()) => accepted += 1,
            Err(Error::QueueFull) => full += 1,
            Err(e) => return Err(e.into()),
        }
    }

    // Wait for the backlog to clear before stopping, so the numbers are final.
    let expected_ms = work_ms.saturating_mul(jobs as u64) + 1000;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(expected_ms);
    while tally.completed.load(Ordering::Relaxed)
        + tally.failed.load(Ordering::Relaxed)
        + tally.skipped.load(Ordering::Relaxed)
        < accepted
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Memoize the summary line the way a read path would.
    let summary_key = cache_key("run-summary", &[&name, &jobs]);
    let summary: String = remember(
        services.cache.as_ref(),
        &summary_key,
        Duration::from_secs(60),
        || async {
            Ok::<_, Error>(format!(
                "accepted={accepted} rejected_full={full} completed={} failed={} skipped={}",
                tally.completed.load(Ordering::Relaxed),
                tally.failed.load(Ordering::Relaxed),
                tally.skipped.load(Ordering::Relaxed),
            ))
        },
    )
    .await?;

    services.shutdown().await;
    drop(services);
    listener.await?;

    println!("{summary} discarded={}", tally.discarded.load(Ordering::Relaxed));
    Ok(())
}
