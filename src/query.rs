use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimConfig;
use crate::model::*;

/// Supplies the queries a worker executes, one per iteration.
pub trait QuerySource: Send {
    fn next_query(&mut self) -> Query;
}

/// Builds one query source per worker at startup. A failure aborts the run.
pub trait QuerySourceFactory: Send + Sync {
    fn create(&self, worker: WorkerId) -> Result<Box<dyn QuerySource>, String>;
}

/// Uniformly random event, uniformly random kind, random ticket count for bookings.
pub struct RandomQuerySource {
    rng: StdRng,
    event_count: usize,
    min_tickets: Seats,
    max_tickets: Seats,
}

impl RandomQuerySource {
    pub fn new(rng: StdRng, event_count: usize, min_tickets: Seats, max_tickets: Seats) -> Self {
        Self {
            rng,
            event_count,
            min_tickets,
            max_tickets,
        }
    }
}

impl QuerySource for RandomQuerySource {
    fn next_query(&mut self) -> Query {
        let event = self.rng.random_range(0..self.event_count) as EventIndex;
        match self.rng.random_range(0..3u8) {
            0 => Query::Availability { event },
            1 => Query::Book {
                event,
                tickets: self.rng.random_range(self.min_tickets..=self.max_tickets),
            },
            _ => Query::Cancel { event },
        }
    }
}

/// Seeds each worker's [`RandomQuerySource`] from the run configuration.
pub struct RandomSourceFactory {
    config: SimConfig,
}

impl RandomSourceFactory {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl QuerySourceFactory for RandomSourceFactory {
    fn create(&self, worker: WorkerId) -> Result<Box<dyn QuerySource>, String> {
        if self.config.event_count == 0 {
            return Err("no events to query".into());
        }
        let rng = seeded_rng(self.config.worker_seed(worker));
        Ok(Box::new(RandomQuerySource::new(
            rng,
            self.config.event_count,
            self.config.min_tickets,
            self.config.max_tickets,
        )))
    }
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Replays a fixed list of queries, wrapping around at the end.
pub struct ScriptedQuerySource {
    script: VecDeque<Query>,
}

impl ScriptedQuerySource {
    pub fn new(script: impl IntoIterator<Item = Query>) -> Self {
        let script: VecDeque<Query> = script.into_iter().collect();
        assert!(!script.is_empty(), "scripted source needs at least one query");
        Self { script }
    }
}

impl QuerySource for ScriptedQuerySource {
    fn next_query(&mut self) -> Query {
        let next = self.script[0];
        self.script.rotate_left(1);
        next
    }
}

/// Hands every worker a copy of the same script.
pub struct ScriptedSourceFactory {
    script: Vec<Query>,
}

impl ScriptedSourceFactory {
    pub fn new(script: Vec<Query>) -> Self {
        Self { script }
    }
}

impl QuerySourceFactory for ScriptedSourceFactory {
    fn create(&self, _worker: WorkerId) -> Result<Box<dyn QuerySource>, String> {
        if self.script.is_empty() {
            return Err("empty query script".into());
        }
        Ok(Box::new(ScriptedQuerySource::new(self.script.clone())))
    }
}
