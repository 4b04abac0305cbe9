use rand::prelude::*;
use std::fmt;

use super::memory::{Access, MemoryManager, Page, SimPid};
use super::policy::Algorithm;
use crate::error::MemoryError;

// Reference strings run under a single simulated process.
const SIM_PID: SimPid = 1;

/// Longest generated reference string.
pub const MAX_REFERENCE_LEN: usize = 1_000_000;

/// One algorithm's run over a reference string.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    pub algorithm: Algorithm,
    pub frames: usize,
    pub trace: Vec<(Page, Access)>,
}

impl SimOutcome {
    pub fn faults(&self) -> usize {
        self.trace.iter().filter(|(_, a)| a.is_fault()).count()
    }

    pub fn hits(&self) -> usize {
        self.trace.len() - self.faults()
    }

    pub fn fault_pages(&self) -> Vec<Page> {
        self.trace
            .iter()
            .filter(|(_, a)| a.is_fault())
            .map(|(page, _)| *page)
            .collect()
    }
}

impl fmt::Display for SimOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marks: Vec<String> = self
            .trace
            .iter()
            .map(|(page, access)| match access {
                Access::Hit { .. } => format!("{page}"),
                Access::Fault { .. } => format!("{page}*"),
            })
            .collect();
        write!(
            f,
            "{:<4} frames={} faults={} hits={}  [{}]",
            self.algorithm,
            self.frames,
            self.faults(),
            self.hits(),
            marks.join(" ")
        )
    }
}

/// Run `refs` through a fresh manager using `algorithm`.
pub fn simulate(
    frames: usize,
    algorithm: Algorithm,
    refs: &[Page],
) -> Result<SimOutcome, MemoryError> {
    let mut mm = MemoryManager::new(frames, algorithm)?;
    mm.add_process(SIM_PID)?;
    let trace = refs
        .iter()
        .map(|&page| mm.access_page(SIM_PID, page).map(|access| (page, access)))
        .collect::<Result<_, _>>()?;
    Ok(SimOutcome {
        algorithm,
        frames,
        trace,
    })
}

/// Run `refs` under every algorithm, in [`Algorithm::ALL`] order.
pub fn compare(frames: usize, refs: &[Page]) -> Result<Vec<SimOutcome>, MemoryError> {
    Algorithm::ALL
        .iter()
        .map(|&algorithm| simulate(frames, algorithm, refs))
        .collect()
}

/// Seeded uniform reference string over pages `1..=max_page`.
pub fn random_reference_string(len: usize, max_page: Page, seed: u64) -> Vec<Page> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(1..=max_page.max(1))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_and_lru_diverge_on_classic_string() {
        let refs = [1, 2, 3, 1, 4, 5, 1, 2];
        let outcomes = compare(3, &refs).unwrap();

        let fifo = &outcomes[0];
        assert_eq!(fifo.algorithm, Algorithm::Fifo);
        assert_eq!((fifo.faults(), fifo.hits()), (7, 1));
        assert_eq!(fifo.fault_pages(), vec![1, 2, 3, 4, 5, 1, 2]);

        let lru = &outcomes[1];
        assert_eq!((lru.faults(), lru.hits()), (6, 2));
        assert_eq!(lru.fault_pages(), vec![1, 2, 3, 4, 5, 2]);
        assert_eq!(
            lru.to_string(),
            "LRU  frames=3 faults=6 hits=2  [1* 2* 3* 1 4* 5* 1 2*]"
        );
    }

    #[test]
    fn random_strings_are_reproducible() {
        let a = random_reference_string(50, 8, 42);
        let b = random_reference_string(50, 8, 42);
        assert_eq!(a, b);
        assert!(a.iter().all(|&p| (1..=8).contains(&p)));
    }

    #[test]
    fn more_frames_than_pages_faults_once_per_page() {
        let refs = random_reference_string(200, 5, 7);
        let mut distinct = refs.clone();
        distinct.sort_unstable();
        distinct.dedup();
        for outcome in compare(5, &refs).unwrap() {
            assert_eq!(outcome.faults(), distinct.len());
        }
    }

    #[test]
    fn zero_frames_rejected() {
        assert_eq!(
            simulate(0, Algorithm::Fifo, &[1]).unwrap_err(),
            MemoryError::NoFrames
        );
    }
}
