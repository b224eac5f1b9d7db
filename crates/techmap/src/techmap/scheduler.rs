//! Batch partitioning and the parallel map/scatter loop.
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::{EventSink, TechMapEvent};
use crate::extent::Gid;

/// A contiguous run of gids handled by one task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub id: usize,
    pub gids: Vec<Gid>,
}

/// Splits `gids` into `ceil(n / gids_per_batch)` contiguous batches of nearly equal size.
///
/// The first `n % k` batches hold one extra gid. An empty range yields no batches.
pub fn split_gids(gids: Range<Gid>, gids_per_batch: usize) -> Vec<Batch> {
    let n = gids.len();
    if n == 0 {
        return Vec::new();
    }
    let k = n.div_ceil(gids_per_batch.max(1));
    let base = n / k;
    let extra = n % k;

    let mut start = gids.start;
    (0..k)
        .map(|id| {
            let len = base + usize::from(id < extra);
            let batch = Batch {
                id,
                gids: (start..start + len).collect(),
            };
            start += len;
            batch
        })
        .collect()
}

/// Runs `task` for every batch on a pool of `workers` threads and feeds each result to
/// `scatter` on the calling thread, in completion order.
///
/// The first failing task or scatter aborts the run: batches not yet started are skipped and the
/// error is returned.
pub fn run_batches<T, F, S>(
    batches: &[Batch],
    workers: usize,
    task: F,
    mut scatter: S,
    sink: &mut dyn EventSink,
) -> Result<()>
where
    T: Send,
    F: Fn(&Batch) -> Result<T> + Sync,
    S: FnMut(&Batch, T) -> Result<()>,
{
    let total = batches.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("techmap-worker-{i}"))
        .build()
        .map_err(|e| Error::Worker(format!("failed to build thread pool: {e}")))?;
    let abort = AtomicBool::new(false);

    let completed = pool.in_place_scope(|scope| -> Result<usize> {
        let (tx, rx) = mpsc::channel::<(usize, Result<T>)>();
        for batch in batches {
            let tx = tx.clone();
            let abort = &abort;
            let task = &task;
            scope.spawn(move |_| {
                if abort.load(Ordering::Relaxed) {
                    return;
                }
                debug!("Starting batch {} with gids {:?}.", batch.id, batch.gids);
                // The receiver is gone once the run aborted.
                let _ = tx.send((batch.id, task(batch)));
            });
        }
        drop(tx);

        let mut completed = 0;
        for (batch_id, result) in rx {
            let outcome = result.and_then(|value| scatter(&batches[batch_id], value));
            if let Err(err) = outcome {
                abort.store(true, Ordering::Relaxed);
                return Err(err);
            }
            completed += 1;
            info!("Completed {} out of {} batches.", completed, total);
            sink.send(TechMapEvent::BatchCompleted {
                batch_id,
                completed,
                total,
            });
        }
        Ok(completed)
    })?;

    if completed != total {
        return Err(Error::Worker(format!(
            "only {completed} of {total} batches completed"
        )));
    }
    Ok(())
}
