//! Runs one day's country steps on a bounded pool of worker threads.
//!
//! Each task owns a copy of one country. Workers never share mutable state: they step their copy
//! and send it back over a channel together with the result. `dispatch` returns only once the
//! channel closes, that is once every task has either replied or died, which is the barrier
//! between days.

use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::sync::Arc;

use log::{error, trace};
use threadpool::ThreadPool;

use crate::config::{MortalityMode, SimulationConfig};
use crate::country::{Country, CountrySnapshot};
use crate::error::EpiError;
use crate::step::{advance_country, StepContext};

/// What a worker sends back for one country.
#[derive(Debug)]
pub struct TaskResult {
    /// Position of the country in the dispatch order.
    pub index: usize,
    pub country: Country,
    pub outcome: Result<CountrySnapshot, EpiError>,
}

/// Number of workers to use when none is configured.
#[must_use]
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Creates a pool with `threads` workers, or one per available core.
    #[must_use]
    pub fn new(threads: Option<usize>) -> WorkerPool {
        let size = threads.unwrap_or_else(default_pool_size).max(1);
        trace!("creating worker pool with {} threads", size);
        WorkerPool {
            pool: ThreadPool::with_name("epiworld-worker".to_string(), size),
        }
    }

    pub fn size(&self) -> usize {
        self.pool.max_count()
    }

    /// Steps every country for `day` and waits for all of them.
    ///
    /// Results come back in no particular order; a task whose worker panicked produces no
    /// result at all.
    pub fn dispatch(
        &self,
        countries: Vec<(usize, Country)>,
        config: &Arc<SimulationConfig>,
        day: u32,
        mortality: MortalityMode,
    ) -> Vec<TaskResult> {
        let expected = countries.len();
        let (sender, receiver) = mpsc::channel::<TaskResult>();

        for (index, mut country) in countries {
            let sender = sender.clone();
            let config = Arc::clone(config);
            trace!("dispatching {} for day {}", country.name(), day);
            self.pool.execute(move || {
                let context = StepContext {
                    config: &config,
                    day,
                    mortality,
                };
                let outcome = advance_country(&mut country, &context);
                let result = TaskResult {
                    index,
                    country,
                    outcome,
                };
                if let Err(e) = sender.send(result) {
                    error!("coordinator stopped listening: {e}");
                }
            });
        }
        drop(sender);

        let results: Vec<TaskResult> = receiver.iter().collect();
        trace!("received {} of {} results for day {}", results.len(), expected, day);
        results
    }
}
