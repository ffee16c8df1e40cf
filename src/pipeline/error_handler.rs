use anyhow::Result;
use std::sync::{Arc, Mutex};

/// Return the first recorded worker error, if any. Call after joining the workers.
pub fn check_for_first_error(first_error: &Arc<Mutex<Option<String>>>) -> Result<()> {
    let recorded = first_error
        .lock()
        .map_err(|_| anyhow::anyhow!("worker error slot poisoned"))?
        .take();
    match recorded {
        Some(msg) => Err(anyhow::anyhow!("{}", msg)),
        None => Ok(()),
    }
}
