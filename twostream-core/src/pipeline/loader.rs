//! Batch loader: parallel sample assembly behind a bounded queue.
//!
//! A producer thread walks the epoch order in batch-sized chunks and assembles
//! every chunk on a rayon pool of `workers` threads. Finished batches go
//! through a bounded crossbeam channel to the caller's thread, which is the
//! only place results are consumed. When the queue is full the producer
//! blocks, which bounds memory to roughly `queue_capacity` batches.
//!
//! Cancellation is cooperative: the producer checks the flag before starting
//! a batch and the consumer checks it before handing a batch on. Batches
//! already in the queue are dropped unconsumed.

// ---- Standard library imports ----
use std::sync::atomic::{AtomicBool, Ordering};

// ---- External crate imports ----
use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

// ---- Internal crate imports ----
use crate::config::CoreConfig;
use crate::dataset::{ClipDataset, DatasetMode, Sample};
use crate::error::{CoreError, CoreResult};

/// A batch of assembled samples, numbered from 0 within the epoch.
#[derive(Debug)]
pub struct Batch {
    pub index: usize,
    pub samples: Vec<Sample>,
}

/// How a loading run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed { batches: usize },
    Cancelled { batches: usize },
}

impl LoadOutcome {
    /// Batches handed to the consumer.
    #[must_use]
    pub fn batches(&self) -> usize {
        match self {
            LoadOutcome::Completed { batches } | LoadOutcome::Cancelled { batches } => *batches,
        }
    }
}

/// Iterates a dataset in batches.
///
/// Training datasets are reshuffled every epoch; evaluation datasets are
/// visited in index order.
#[derive(Debug)]
pub struct BatchLoader<'a> {
    dataset: &'a ClipDataset,
    batch_size: usize,
    workers: usize,
    queue_capacity: usize,
    shuffle: bool,
    seed: Option<u64>,
}

impl<'a> BatchLoader<'a> {
    pub fn new(dataset: &'a ClipDataset, config: &CoreConfig) -> Self {
        Self {
            dataset,
            batch_size: config.batch_size.max(1),
            workers: config.workers.max(1),
            queue_capacity: config.queue_capacity.max(1),
            shuffle: dataset.mode() == DatasetMode::Train,
            seed: None,
        }
    }

    /// Makes shuffling and training offsets reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    #[must_use]
    pub fn dataset(&self) -> &ClipDataset {
        self.dataset
    }

    /// Sample order for one epoch.
    fn epoch_order(&self, seed: u64, epoch: u64) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch));
            order.shuffle(&mut rng);
        }
        order
    }

    /// Runs one epoch, calling `consume` for every batch on the caller's
    /// thread.
    ///
    /// The first sample error or consumer error stops the run and is
    /// returned; batches still in flight are discarded.
    pub fn run<F>(&self, epoch: u64, cancel: &AtomicBool, mut consume: F) -> CoreResult<LoadOutcome>
    where
        F: FnMut(Batch) -> CoreResult<()>,
    {
        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        let order = self.epoch_order(seed, epoch);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| CoreError::WorkerPool(format!("Failed to initialize worker pool: {e}")))?;

        debug!(
            "Loading {} clips in {} batches ({} workers, queue {})",
            order.len(),
            self.num_batches(),
            self.workers,
            self.queue_capacity
        );

        std::thread::scope(|scope| {
            let (tx, rx) = bounded(self.queue_capacity);
            let producer = scope.spawn(|| self.produce(&pool, &order, seed, epoch, cancel, tx));
            let result = Self::drain(rx, cancel, &mut consume);
            if producer.join().is_err() {
                return Err(CoreError::WorkerPool("Batch producer panicked".to_string()));
            }
            result
        })
    }

    fn produce(
        &self,
        pool: &rayon::ThreadPool,
        order: &[usize],
        seed: u64,
        epoch: u64,
        cancel: &AtomicBool,
        tx: Sender<CoreResult<Batch>>,
    ) {
        for (batch_index, chunk) in order.chunks(self.batch_size).enumerate() {
            if cancel.load(Ordering::Relaxed) {
                debug!("Cancelled before batch {batch_index}");
                return;
            }
            let base = batch_index * self.batch_size;
            let assembled: CoreResult<Vec<Sample>> = pool.install(|| {
                chunk
                    .par_iter()
                    .enumerate()
                    .map(|(offset, &sample_index)| {
                        let mut rng = StdRng::seed_from_u64(sample_seed(seed, epoch, base + offset));
                        self.dataset.get(sample_index, &mut rng)
                    })
                    .collect()
            });
            let failed = assembled.is_err();
            let message = assembled.map(|samples| Batch {
                index: batch_index,
                samples,
            });
            // A closed channel means the consumer has stopped.
            if tx.send(message).is_err() || failed {
                return;
            }
        }
    }

    fn drain<F>(rx: Receiver<CoreResult<Batch>>, cancel: &AtomicBool, consume: &mut F) -> CoreResult<LoadOutcome>
    where
        F: FnMut(Batch) -> CoreResult<()>,
    {
        let mut batches = 0;
        for message in rx.iter() {
            if cancel.load(Ordering::Relaxed) {
                warn!("Pass cancelled after {batches} batches; discarding queued batches");
                return Ok(LoadOutcome::Cancelled { batches });
            }
            consume(message?)?;
            batches += 1;
        }
        if cancel.load(Ordering::Relaxed) {
            return Ok(LoadOutcome::Cancelled { batches });
        }
        Ok(LoadOutcome::Completed { batches })
    }
}

/// Per-sample RNG seed, distinct for every (epoch, position).
fn sample_seed(seed: u64, epoch: u64, position: usize) -> u64 {
    seed ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (position as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}
