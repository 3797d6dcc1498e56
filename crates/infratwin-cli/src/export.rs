//! History export: one JSON Lines file with full records (including the
//! frozen envelope/result snapshots) and one flat CSV without them.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use infratwin_core::ExecRecord;

const CSV_HEADER: &str = "step_id,ts,twin_id,route,policy,queue_ms,elapsed_ms,\
latency_breach,fallback_reasons,objective_value,confidence,noise_proxy,cost";

/// Writes `history.jsonl` and `history.csv` under `dir`, creating it if
/// needed. Returns the number of records written.
pub fn write_history(dir: &Path, history: &[ExecRecord]) -> Result<usize> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let jsonl_path = dir.join("history.jsonl");
    let mut jsonl = fs::File::create(&jsonl_path)
        .with_context(|| format!("failed to create {}", jsonl_path.display()))?;
    for record in history {
        let line = serde_json::to_string(record).context("failed to serialize record")?;
        writeln!(jsonl, "{line}")
            .with_context(|| format!("failed to write {}", jsonl_path.display()))?;
    }

    let csv_path = dir.join("history.csv");
    let mut csv = String::with_capacity(history.len() * 96);
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for record in history {
        let _ = writeln!(csv, "{}", csv_row(record));
    }
    fs::write(&csv_path, csv)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;

    Ok(history.len())
}

fn csv_row(record: &ExecRecord) -> String {
    let reasons = record
        .fallback_reasons
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(";");
    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{}",
        record.step_id,
        record.ts.to_rfc3339(),
        record.twin_id,
        record.route,
        record.policy,
        opt(record.queue_ms),
        record.elapsed_ms,
        record.latency_breach,
        reasons,
        record.objective_value,
        record.confidence,
        opt(record.noise_proxy),
        opt(record.cost),
    )
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}
