use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::context::WorkerEvent;
use crate::context::SourceContext;
use crate::error::SourceResult;
use crate::source::BoundedSource;

/// Single bundle worker: take bundles from `bundle_rx`, read each with its own reader, send
/// every record on `event_tx`. Stops at the first failure anywhere in the pipeline.
fn bundle_worker_loop(
    bundle_rx: Receiver<BoundedSource>,
    event_tx: Sender<WorkerEvent>,
    ctx: SourceContext,
    first_error: Arc<Mutex<Option<String>>>,
) {
    while let Ok(bundle) = bundle_rx.recv() {
        if has_error(&first_error) {
            break;
        }
        match read_bundle(&bundle, &ctx, &event_tx) {
            Ok(Some(records)) => {
                if event_tx.send(WorkerEvent::BundleDone { records }).is_err() {
                    break;
                }
            }
            // Receiver gone; nobody is listening any more.
            Ok(None) => break,
            Err(e) => {
                error!("Bundle {} failed: {e}", describe(&bundle));
                record_first_error(&first_error, format!("{}: {e}", describe(&bundle)));
                // Other workers stop at their next record.
                ctx.interrupt().raise();
                break;
            }
        }
    }
    drop(event_tx);
}

/// Read one bundle to the end. `Ok(None)` when the event receiver hung up mid-bundle.
fn read_bundle(
    bundle: &BoundedSource,
    ctx: &SourceContext,
    event_tx: &Sender<WorkerEvent>,
) -> SourceResult<Option<usize>> {
    let mut reader = bundle.create_reader(ctx)?;
    let mut records = 0;
    let mut more = reader.start()?;
    while more {
        let pair = reader.current()?.clone();
        if event_tx.send(WorkerEvent::Record(pair)).is_err() {
            reader.close()?;
            return Ok(None);
        }
        records += 1;
        more = reader.advance()?;
    }
    reader.close()?;
    debug!("Bundle {} done: {} records", describe(bundle), records);
    Ok(Some(records))
}

fn describe(bundle: &BoundedSource) -> String {
    match bundle.split() {
        Some(split) => format!(
            "{} [{} split, {} bytes]",
            bundle.resource().unwrap_or_default(),
            split.type_tag(),
            split.length()
        ),
        None => bundle.resource().unwrap_or_default().to_string(),
    }
}

fn has_error(first_error: &Arc<Mutex<Option<String>>>) -> bool {
    first_error.lock().map(|slot| slot.is_some()).unwrap_or(true)
}

/// Keep only the first error; later ones are usually fallout from the interruption it caused.
fn record_first_error(first_error: &Arc<Mutex<Option<String>>>, message: String) {
    if let Ok(mut slot) = first_error.lock()
        && slot.is_none()
    {
        *slot = Some(message);
    }
}

/// Spawn bundle workers. Each gets its own clone of `ctx` (registries are shared, the
/// interruption flag is the same flag). Caller must drop its `event_tx` afterwards so the
/// event channel closes when the last worker exits.
pub fn spawn_bundle_workers(
    bundle_rx: Receiver<BoundedSource>,
    event_tx: &Sender<WorkerEvent>,
    ctx: &SourceContext,
    first_error: &Arc<Mutex<Option<String>>>,
    num_threads: usize,
) -> Vec<JoinHandle<()>> {
    (0..num_threads)
        .map(|_| {
            let bundle_rx = bundle_rx.clone();
            let event_tx = event_tx.clone();
            let ctx = ctx.clone();
            let first_error = Arc::clone(first_error);
            thread::spawn(move || bundle_worker_loop(bundle_rx, event_tx, ctx, first_error))
        })
        .collect()
}
