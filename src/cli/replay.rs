//! Replay command handler.
//!
//! Reads one JSON operation per line and runs it against a fresh cache on a
//! manual clock, so a script fully determines timing:
//!
//! ```text
//! {"op": "set", "message": "hi", "context": {"mood": "happy"}, "payload": "A", "at": 0}
//! {"op": "get", "message": "hi", "context": {"mood": "happy"}, "at": 200}
//! {"op": "sweep", "at": 5000}
//! {"op": "stats"}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use adaptive_cache::cache::key::message_from_value;
use adaptive_cache::cache::{ContextDescriptor, ManualClock, ResponseCache, SetMetadata};
use adaptive_cache::config::CacheConfig;
use adaptive_cache::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReplayOp {
    Get,
    Set,
    Peek,
    Sweep,
    Clear,
    Stats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayLine {
    op: ReplayOp,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    context: Value,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    estimated_cost: Option<u64>,
    /// Clock time for this operation, in ms. Omit to keep the previous time.
    #[serde(default)]
    at: Option<u64>,
}

/// Counts reported after a replay.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ReplaySummary {
    pub operations: usize,
    pub failed: usize,
}

/// Replay a script file and print one result line per operation.
pub(crate) fn cmd_replay(input: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => CacheConfig::load_from_path(&path)
            .with_context(|| format!("Failed to load cache config {}", path.display()))?,
        None => CacheConfig::default(),
    }
    .with_env_overrides();

    let clock = Arc::new(ManualClock::new(0));
    let cache: ResponseCache<Value> = ResponseCache::with_clock(config, clock.clone())?;

    let file = std::fs::File::open(&input)
        .with_context(|| format!("Failed to open replay script {}", input.display()))?;
    let stdout = std::io::stdout();
    let summary = run_replay(&cache, &clock, BufReader::new(file), stdout.lock())?;

    eprintln!(
        "Replayed {} operation(s), {} failed",
        summary.operations, summary.failed
    );
    Ok(())
}

pub(crate) fn run_replay<R: BufRead, W: Write>(
    cache: &ResponseCache<Value>,
    clock: &ManualClock,
    reader: R,
    mut out: W,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_no = index + 1;
        summary.operations += 1;

        let result = serde_json::from_str::<ReplayLine>(trimmed)
            .map_err(CacheError::from)
            .and_then(|op| apply(cache, clock, op));
        let record = match result {
            Ok(mut record) => {
                record["line"] = json!(line_no);
                record
            }
            Err(err) => {
                warn!(line = line_no, error = %err, "Replay operation failed");
                summary.failed += 1;
                json!({"line": line_no, "error": err.to_string()})
            }
        };
        writeln!(out, "{record}")?;
    }
    Ok(summary)
}

fn apply(
    cache: &ResponseCache<Value>,
    clock: &ManualClock,
    line: ReplayLine,
) -> Result<Value, CacheError> {
    if let Some(at) = line.at {
        clock.set(at);
    }
    let record = match line.op {
        ReplayOp::Get => {
            let message = message_from_value(&line.message)?;
            let context = ContextDescriptor::from_value(&line.context)?;
            match cache.get(message, &context)? {
                Some(payload) => json!({"op": "get", "hit": true, "payload": payload}),
                None => json!({"op": "get", "hit": false}),
            }
        }
        ReplayOp::Set => {
            let message = message_from_value(&line.message)?;
            let context = ContextDescriptor::from_value(&line.context)?;
            let metadata = SetMetadata {
                estimated_cost: line.estimated_cost,
            };
            cache.set(message, &context, line.payload, metadata)?;
            json!({"op": "set", "size": cache.len()})
        }
        ReplayOp::Peek => {
            let message = message_from_value(&line.message)?;
            let context = ContextDescriptor::from_value(&line.context)?;
            json!({"op": "peek", "entry": cache.peek(message, &context)?})
        }
        ReplayOp::Sweep => json!({"op": "sweep", "removed": cache.sweep()}),
        ReplayOp::Clear => {
            cache.clear();
            json!({"op": "clear"})
        }
        ReplayOp::Stats => json!({"op": "stats", "stats": cache.stats()}),
    };
    Ok(record)
}
