// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Stress tool for the block store.
//!
//! Runs a number of workers against one shared store. Each worker plays an executor site:
//! it spills random blocks under its own owner id, reloads and verifies them, and releases
//! them again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use blockswap::{BlockKey, BlockStore, SwapOptions, SwapStats};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::filter;
use tracing_subscriber::prelude::*;

/// blockswap: spill large query blocks to local disk.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Swap directory. Created if missing; its contents are deleted on startup.
    #[clap(short, long)]
    dir: Option<PathBuf>,

    /// Number of concurrent workers, one owner id each
    #[clap(short, long, default_value_t = 4)]
    workers: usize,

    /// Blocks spilled by each worker
    #[clap(short, long, default_value_t = 256)]
    blocks: usize,

    /// Largest block size in bytes
    #[clap(long, default_value_t = 1 << 20)]
    max_block_size: usize,

    /// Blocks each worker keeps spilled before it starts releasing
    #[clap(long, default_value_t = 16)]
    resident: usize,

    /// Seed of the payload generator
    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// Sync every block file to disk before it becomes visible
    #[clap(long)]
    fsync: bool,

    /// Print the report as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    workers: usize,
    elapsed_ms: u128,
    stores_per_sec: f64,
    write_mib_per_sec: f64,
    stats: SwapStats,
}

impl Report {
    fn new(workers: usize, elapsed: Duration, stats: SwapStats) -> Self {
        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        Self {
            workers,
            elapsed_ms: elapsed.as_millis(),
            stores_per_sec: stats.stores as f64 / secs,
            write_mib_per_sec: stats.bytes_written as f64 / secs / (1 << 20) as f64,
            stats,
        }
    }
}

/// Spill, verify and release `args.blocks` blocks under one owner id.
fn run_worker(store: &BlockStore, owner_id: i64, args: &Args) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed ^ owner_id as u64);
    let mut resident = std::collections::VecDeque::with_capacity(args.resident + 1);
    let mut dest = vec![0; args.max_block_size];

    for block_id in 0..args.blocks as i64 {
        let key = BlockKey::new(owner_id, block_id);
        let len = rng.gen_range(0..=args.max_block_size);
        let mut payload = vec![0; len];
        rng.fill(payload.as_mut_slice());

        store.store(key, &payload)?;
        resident.push_back((key, payload));

        if resident.len() > args.resident {
            if let Some((key, payload)) = resident.pop_front() {
                verify_and_release(store, key, &payload, &mut dest)?;
            }
        }
    }
    for (key, payload) in resident {
        verify_and_release(store, key, &payload, &mut dest)?;
    }
    Ok(())
}

fn verify_and_release(
    store: &BlockStore,
    key: BlockKey,
    payload: &[u8],
    dest: &mut [u8],
) -> Result<()> {
    let len = store.load(key, dest)?;
    if &dest[..len] != payload {
        bail!("block {} came back corrupted", key);
    }
    store.release(key)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arc::new(Args::parse());

    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter_layer =
        filter::EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let options = match &args.dir {
        Some(dir) => SwapOptions::new(dir),
        None => SwapOptions::default_for_cli(),
    }
    .with_fsync(args.fsync);
    tokio::fs::create_dir_all(&options.path)
        .await
        .with_context(|| format!("failed to create {}", options.path.display()))?;

    let store = Arc::new(BlockStore::startup(options)?);
    info!(
        workers = args.workers,
        blocks = args.blocks,
        "starting stress run"
    );

    let start = Instant::now();
    let handles = (0..args.workers).map(|worker| {
        let store = store.clone();
        let args = args.clone();
        tokio::task::spawn_blocking(move || run_worker(&store, worker as i64, &args))
    });
    let results = futures::future::try_join_all(handles).await?;
    let elapsed = start.elapsed();

    let failed = results.iter().filter(|r| r.is_err()).count();
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        warn!("worker failed: {:#}", err);
    }

    let report = Report::new(args.workers, elapsed, store.stats());
    let store = Arc::into_inner(store).ok_or_else(|| anyhow!("block store still in use"))?;
    store.shutdown()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} workers, {} blocks stored, {} loaded, {} released in {:?}",
            report.workers,
            report.stats.stores,
            report.stats.loads,
            report.stats.releases,
            elapsed
        );
        println!(
            "{:.0} stores/s, {:.1} MiB/s written",
            report.stores_per_sec, report.write_mib_per_sec
        );
    }

    if failed > 0 {
        bail!("{} of {} workers failed", failed, args.workers);
    }
    Ok(())
}
