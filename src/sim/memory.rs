use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;

use super::policy::{Algorithm, EvictionOrder};
use crate::error::MemoryError;

pub type SimPid = u64;
pub type Page = u64;
pub type FrameId = usize;

/// Largest frame pool a manager will allocate.
pub const MAX_FRAMES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub pid: SimPid,
    pub page: Page,
}

/// Result of [`MemoryManager::access_page`]. A fault is a successful access
/// that had to load the page first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hit {
        frame: FrameId,
    },
    Fault {
        frame: FrameId,
        evicted: Option<PageRef>,
    },
}

impl Access {
    pub fn frame(&self) -> FrameId {
        match *self {
            Self::Hit { frame } | Self::Fault { frame, .. } => frame,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    pub fn is_fault(&self) -> bool {
        !self.is_hit()
    }
}

#[derive(Debug, Default)]
struct ProcessMemory {
    page_table: FxHashMap<Page, FrameId>,
    faults: u64,
    hits: u64,
}

/// Demand-paged frame pool. Not internally synchronized.
#[derive(Debug)]
pub struct MemoryManager {
    frames: Vec<Option<PageRef>>,
    free: BTreeSet<FrameId>,
    processes: FxHashMap<SimPid, ProcessMemory>,
    order: EvictionOrder,
}

impl MemoryManager {
    pub fn new(total_frames: usize, algorithm: Algorithm) -> Result<Self, MemoryError> {
        if total_frames == 0 {
            return Err(MemoryError::NoFrames);
        }
        if total_frames > MAX_FRAMES {
            return Err(MemoryError::TooManyFrames(total_frames));
        }
        Ok(Self {
            frames: vec![None; total_frames],
            free: (0..total_frames).collect(),
            processes: FxHashMap::default(),
            order: EvictionOrder::new(algorithm),
        })
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.order.algorithm()
    }

    pub fn add_process(&mut self, pid: SimPid) -> Result<(), MemoryError> {
        if self.processes.contains_key(&pid) {
            return Err(MemoryError::DuplicateProcess(pid));
        }
        self.processes.insert(pid, ProcessMemory::default());
        log::debug!("memory: added process {pid}");
        Ok(())
    }

    /// Free every frame held by `pid` and forget the process.
    /// Returns the number of frames released.
    pub fn remove_process(&mut self, pid: SimPid) -> Result<usize, MemoryError> {
        let memory = self
            .processes
            .remove(&pid)
            .ok_or(MemoryError::UnknownProcess(pid))?;

        for (&page, &frame) in &memory.page_table {
            self.frames[frame] = None;
            self.free.insert(frame);
            self.order.forget(PageRef { pid, page });
        }
        log::debug!(
            "memory: removed process {pid}, freed {} frames",
            memory.page_table.len()
        );
        self.check_invariants();
        Ok(memory.page_table.len())
    }

    pub fn access_page(&mut self, pid: SimPid, page: Page) -> Result<Access, MemoryError> {
        let page_ref = PageRef { pid, page };
        let memory = self
            .processes
            .get_mut(&pid)
            .ok_or(MemoryError::UnknownProcess(pid))?;

        if let Some(&frame) = memory.page_table.get(&page) {
            memory.hits += 1;
            self.order.touched(page_ref);
            log::trace!("memory: hit pid {pid} page {page} in frame {frame}");
            return Ok(Access::Hit { frame });
        }

        memory.faults += 1;
        let (frame, evicted) = match self.free.pop_first() {
            Some(frame) => (frame, None),
            None => {
                let (frame, victim) = self.evict();
                (frame, Some(victim))
            }
        };

        self.frames[frame] = Some(page_ref);
        self.processes
            .get_mut(&pid)
            .expect("faulting process vanished")
            .page_table
            .insert(page, frame);
        self.order.loaded(page_ref);
        log::trace!("memory: fault pid {pid} page {page} -> frame {frame}, evicted {evicted:?}");

        self.check_invariants();
        Ok(Access::Fault { frame, evicted })
    }

    // Only called with no free frame, so the eviction order is non-empty.
    fn evict(&mut self) -> (FrameId, PageRef) {
        let victim = self
            .order
            .victim()
            .expect("full frame pool with empty eviction order");
        let frame = self
            .processes
            .get_mut(&victim.pid)
            .and_then(|memory| memory.page_table.remove(&victim.page))
            .expect("eviction victim missing from its page table");
        self.frames[frame] = None;
        (frame, victim)
    }

    pub fn is_resident(&self, pid: SimPid, page: Page) -> bool {
        self.processes
            .get(&pid)
            .is_some_and(|memory| memory.page_table.contains_key(&page))
    }

    pub fn resident_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_some()).count()
    }

    /// Frame-by-frame contents.
    pub fn frames(&self) -> &[Option<PageRef>] {
        &self.frames
    }

    pub fn stats(&self) -> MemoryStats {
        let mut processes: Vec<ProcessStats> = self
            .processes
            .iter()
            .map(|(&pid, memory)| {
                let mut resident: Vec<Page> = memory.page_table.keys().copied().collect();
                resident.sort_unstable();
                ProcessStats {
                    pid,
                    faults: memory.faults,
                    hits: memory.hits,
                    resident,
                }
            })
            .collect();
        processes.sort_by_key(|p| p.pid);
        MemoryStats {
            total_frames: self.total_frames(),
            algorithm: self.algorithm(),
            processes,
        }
    }

    /// Frame map followed by every page table.
    pub fn state(&self) -> MemoryState<'_> {
        MemoryState(self)
    }

    fn check_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let mapped: usize = self.processes.values().map(|m| m.page_table.len()).sum();
        debug_assert_eq!(mapped, self.resident_count(), "page tables disagree with frames");
        debug_assert_eq!(
            mapped + self.free.len(),
            self.frames.len(),
            "free list disagrees with frames"
        );
        debug_assert_eq!(mapped, self.order.len(), "eviction order disagrees with frames");
        for (&pid, memory) in &self.processes {
            for (&page, &frame) in &memory.page_table {
                debug_assert_eq!(
                    self.frames[frame],
                    Some(PageRef { pid, page }),
                    "frame {frame} does not hold pid {pid} page {page}"
                );
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStats {
    pub pid: SimPid,
    pub faults: u64,
    pub hits: u64,
    pub resident: Vec<Page>,
}

/// Display-only summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    pub total_frames: usize,
    pub algorithm: Algorithm,
    pub processes: Vec<ProcessStats>,
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total frames: {}", self.total_frames)?;
        write!(f, "Algorithm: {}", self.algorithm)?;
        for p in &self.processes {
            write!(
                f,
                "\nPID {}: {} page faults, {} hits, pages in memory: {:?}",
                p.pid, p.faults, p.hits, p.resident
            )?;
        }
        Ok(())
    }
}

pub struct MemoryState<'a>(&'a MemoryManager);

impl fmt::Display for MemoryState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Memory State]")?;
        for (frame, content) in self.0.frames.iter().enumerate() {
            match content {
                Some(r) => writeln!(f, "Frame {frame}: PID {}, Page {}", r.pid, r.page)?,
                None => writeln!(f, "Frame {frame}: [FREE]")?,
            }
        }
        write!(f, "[Page Tables]")?;
        let mut pids: Vec<_> = self.0.processes.keys().copied().collect();
        pids.sort_unstable();
        for pid in pids {
            let mut entries: Vec<_> = self.0.processes[&pid]
                .page_table
                .iter()
                .map(|(&page, &frame)| (page, frame))
                .collect();
            entries.sort_unstable();
            let table: Vec<String> = entries.iter().map(|(p, fr)| format!("{p}->{fr}")).collect();
            write!(f, "\nPID {pid}: {{{}}}", table.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQUENCE: [Page; 8] = [1, 2, 3, 1, 4, 5, 1, 2];

    fn run(algorithm: Algorithm) -> (MemoryManager, Vec<Access>) {
        let mut mm = MemoryManager::new(3, algorithm).unwrap();
        mm.add_process(1).unwrap();
        let trace = SEQUENCE
            .iter()
            .map(|&page| mm.access_page(1, page).unwrap())
            .collect();
        (mm, trace)
    }

    fn hit_pattern(trace: &[Access]) -> Vec<bool> {
        trace.iter().map(Access::is_hit).collect()
    }

    #[test]
    fn fifo_reference_string() {
        let (mm, trace) = run(Algorithm::Fifo);
        assert_eq!(
            hit_pattern(&trace),
            vec![false, false, false, true, false, false, false, false]
        );
        let stats = mm.stats();
        assert_eq!(stats.processes[0].faults, 7);
        assert_eq!(stats.processes[0].hits, 1);
        assert_eq!(stats.processes[0].resident, vec![1, 2, 5]);
    }

    #[test]
    fn lru_reference_string() {
        let (mm, trace) = run(Algorithm::Lru);
        assert_eq!(
            hit_pattern(&trace),
            vec![false, false, false, true, false, false, true, false]
        );
        let stats = mm.stats();
        assert_eq!(stats.processes[0].faults, 6);
        assert_eq!(stats.processes[0].hits, 2);
        assert_eq!(stats.processes[0].resident, vec![1, 2, 5]);
    }

    #[test]
    fn fault_reports_victim_and_reuses_its_frame() {
        let (_, trace) = run(Algorithm::Fifo);
        // Access to page 4 evicts page 1, the oldest load, from frame 0.
        assert_eq!(
            trace[4],
            Access::Fault {
                frame: 0,
                evicted: Some(PageRef { pid: 1, page: 1 })
            }
        );
    }

    #[test]
    fn lowest_free_frame_first() {
        let mut mm = MemoryManager::new(4, Algorithm::Fifo).unwrap();
        mm.add_process(1).unwrap();
        mm.add_process(2).unwrap();
        assert_eq!(mm.access_page(1, 10).unwrap().frame(), 0);
        assert_eq!(mm.access_page(2, 10).unwrap().frame(), 1);
        assert_eq!(mm.access_page(1, 11).unwrap().frame(), 2);

        mm.remove_process(2).unwrap();
        assert_eq!(mm.access_page(1, 12).unwrap().frame(), 1);
    }

    #[test]
    fn hit_leaves_frames_untouched() {
        let mut mm = MemoryManager::new(2, Algorithm::Lru).unwrap();
        mm.add_process(7).unwrap();
        mm.access_page(7, 1).unwrap();
        mm.access_page(7, 2).unwrap();
        let before = mm.frames().to_vec();
        assert_eq!(mm.access_page(7, 1).unwrap(), Access::Hit { frame: 0 });
        assert_eq!(mm.frames(), &before[..]);
    }

    #[test]
    fn remove_process_leaves_no_victims_behind() {
        for algorithm in Algorithm::ALL {
            let mut mm = MemoryManager::new(3, algorithm).unwrap();
            mm.add_process(1).unwrap();
            mm.add_process(2).unwrap();
            mm.access_page(1, 1).unwrap();
            mm.access_page(2, 1).unwrap();
            mm.access_page(1, 2).unwrap();

            assert_eq!(mm.remove_process(1).unwrap(), 2);
            assert!(mm.frames().iter().flatten().all(|r| r.pid != 1));

            // Refill: no eviction may name the removed pid.
            for page in 10..20 {
                if let Access::Fault {
                    evicted: Some(victim),
                    ..
                } = mm.access_page(2, page).unwrap()
                {
                    assert_eq!(victim.pid, 2);
                }
            }
        }
    }

    #[test]
    fn identifier_errors() {
        let mut mm = MemoryManager::new(1, Algorithm::Fifo).unwrap();
        assert_eq!(mm.access_page(3, 0), Err(MemoryError::UnknownProcess(3)));
        assert_eq!(mm.remove_process(3), Err(MemoryError::UnknownProcess(3)));
        mm.add_process(3).unwrap();
        assert_eq!(mm.add_process(3), Err(MemoryError::DuplicateProcess(3)));
        assert_eq!(
            MemoryManager::new(0, Algorithm::Lru).unwrap_err(),
            MemoryError::NoFrames
        );
        assert_eq!(
            MemoryManager::new(usize::MAX, Algorithm::Fifo).unwrap_err(),
            MemoryError::TooManyFrames(usize::MAX)
        );
        assert!(MemoryManager::new(MAX_FRAMES, Algorithm::Fifo).is_ok());
    }

    #[test]
    fn stats_and_state_render() {
        let (mm, _) = run(Algorithm::Fifo);
        assert_eq!(
            mm.stats().to_string(),
            "Total frames: 3\nAlgorithm: FIFO\nPID 1: 7 page faults, 1 hits, pages in memory: [1, 2, 5]"
        );
        let state = mm.state().to_string();
        // Final residency after FIFO replacement: frame 0 <- 2, 1 <- 5, 2 <- 1.
        assert!(state.contains("Frame 0: PID 1, Page 2"));
        assert!(state.contains("Frame 2: PID 1, Page 1"));
        assert!(state.contains("PID 1: {1->2, 2->0, 5->1}"));
    }
}
