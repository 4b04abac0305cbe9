use keyed_priority_queue::KeyedPriorityQueue;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use super::memory::PageRef;
use crate::error::ArgError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Fifo,
    Lru,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Fifo, Algorithm::Lru];
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Fifo => "FIFO",
            Self::Lru => "LRU",
        })
    }
}

impl FromStr for Algorithm {
    type Err = ArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FIFO" => Ok(Self::Fifo),
            "LRU" => Ok(Self::Lru),
            _ => Err(ArgError::InvalidAlgorithm(s.to_string())),
        }
    }
}

/// Logical access time. Ord is flipped so the max-heap pops the oldest stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp(u64);

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.cmp(&self.0)
    }
}

/// Order in which resident pages are considered for eviction.
///
/// Only the structure of the active algorithm is kept, so every resident
/// page lives in exactly one place.
#[derive(Debug)]
pub enum EvictionOrder {
    /// Load order; hits never reorder it.
    Fifo { loaded: VecDeque<PageRef> },
    /// Recency order keyed by last-touch stamp.
    Lru {
        recency: KeyedPriorityQueue<PageRef, Stamp>,
        clock: u64,
    },
}

impl EvictionOrder {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Fifo => Self::Fifo {
                loaded: VecDeque::new(),
            },
            Algorithm::Lru => Self::Lru {
                recency: KeyedPriorityQueue::new(),
                clock: 0,
            },
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Fifo { .. } => Algorithm::Fifo,
            Self::Lru { .. } => Algorithm::Lru,
        }
    }

    /// A page was just brought into a frame.
    pub fn loaded(&mut self, page: PageRef) {
        match self {
            Self::Fifo { loaded } => loaded.push_back(page),
            Self::Lru { recency, clock } => {
                *clock += 1;
                recency.push(page, Stamp(*clock));
            }
        }
    }

    /// A resident page was hit.
    pub fn touched(&mut self, page: PageRef) {
        if let Self::Lru { recency, clock } = self {
            *clock += 1;
            let previous = recency.push(page, Stamp(*clock));
            debug_assert!(previous.is_some(), "touched non-resident page {page:?}");
        }
    }

    /// Remove and return the next page to evict.
    pub fn victim(&mut self) -> Option<PageRef> {
        match self {
            Self::Fifo { loaded } => loaded.pop_front(),
            Self::Lru { recency, .. } => recency.pop().map(|(page, _)| page),
        }
    }

    /// Drop a page that left memory without being evicted.
    pub fn forget(&mut self, page: PageRef) {
        match self {
            Self::Fifo { loaded } => loaded.retain(|p| *p != page),
            Self::Lru { recency, .. } => {
                recency.remove(&page);
            }
        }
    }

    pub fn contains(&self, page: PageRef) -> bool {
        match self {
            Self::Fifo { loaded } => loaded.contains(&page),
            Self::Lru { recency, .. } => recency.get_priority(&page).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Fifo { loaded } => loaded.len(),
            Self::Lru { recency, .. } => recency.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u64) -> PageRef {
        PageRef { pid: 1, page: n }
    }

    #[test]
    fn parse_algorithm_names() {
        assert_eq!("fifo".parse::<Algorithm>().unwrap(), Algorithm::Fifo);
        assert_eq!("LRU".parse::<Algorithm>().unwrap(), Algorithm::Lru);
        assert!("clock".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::Lru.to_string(), "LRU");
    }

    #[test]
    fn fifo_ignores_hits() {
        let mut order = EvictionOrder::new(Algorithm::Fifo);
        order.loaded(page(1));
        order.loaded(page(2));
        order.touched(page(1));
        assert_eq!(order.victim(), Some(page(1)));
        assert_eq!(order.victim(), Some(page(2)));
        assert_eq!(order.victim(), None);
    }

    #[test]
    fn lru_evicts_least_recently_touched() {
        let mut order = EvictionOrder::new(Algorithm::Lru);
        order.loaded(page(1));
        order.loaded(page(2));
        order.loaded(page(3));
        order.touched(page(1));
        assert_eq!(order.victim(), Some(page(2)));
        assert_eq!(order.victim(), Some(page(3)));
        assert_eq!(order.victim(), Some(page(1)));
    }

    #[test]
    fn forget_removes_from_either_order() {
        for algorithm in Algorithm::ALL {
            let mut order = EvictionOrder::new(algorithm);
            order.loaded(page(1));
            order.loaded(page(2));
            order.forget(page(1));
            assert!(!order.contains(page(1)));
            assert_eq!(order.len(), 1);
            assert_eq!(order.victim(), Some(page(2)));
            assert!(order.is_empty());
        }
    }
}
