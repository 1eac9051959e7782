use std::time::Instant;

use anyhow::Context;
use streaming_png::{decode, DecodeOptions};

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let mut args = std::env::args().skip(1);
    let path = args.next().context("usage: decode-bench <path> [trials]")?;
    let trials: usize = match args.next() {
        Some(count) => count
            .parse()
            .with_context(|| format!("Invalid trial count {count:?}"))?,
        None => 1,
    };
    let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {path}"))?;
    let options = DecodeOptions::default();

    let mut durations = Vec::with_capacity(trials);
    for _ in 0..trials {
        let start = Instant::now();
        decode(&bytes, &options).with_context(|| format!("Failed to decode {path}"))?;
        let elapsed = start.elapsed();
        println!("{:.3} ms", elapsed.as_secs_f64() * 1000.0);
        durations.push(elapsed.as_secs_f64());
    }

    let now = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Iso8601::DEFAULT)?;
    let mean = durations.iter().sum::<f64>() / durations.len().max(1) as f64;
    let best = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let summary = serde_json::json!({
        "date": now,
        "file": path,
        "bytes": bytes.len(),
        "trials": trials,
        "mean_seconds": mean,
        "best_seconds": best,
    });
    println!("{summary}");
    Ok(())
}
