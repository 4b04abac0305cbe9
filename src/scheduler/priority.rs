use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use keyed_priority_queue::KeyedPriorityQueue;
use std::cmp::Ordering;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core::{JobId, Observer, Priority, ProcessControl, Registry, SchedEvent};

/// Unbounded FIFO of submitted jobs awaiting admission.
#[derive(Debug, Clone)]
pub struct IntakeQueue {
    tx: Sender<JobId>,
    rx: Receiver<JobId>,
}

impl Default for IntakeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn submit(&self, id: JobId) {
        if self.tx.send(id).is_err() {
            log::warn!("intake queue closed; job {id} not admitted");
        }
    }

    /// Jobs submitted but not yet admitted.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    pub fn receiver(&self) -> Receiver<JobId> {
        self.rx.clone()
    }
}

// KeyedPriorityQueue is a max-heap: higher priority first, then the older job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rank {
    priority: Priority,
    id: JobId,
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct PriorityScheduler {
    registry: Arc<Registry>,
    control: Arc<dyn ProcessControl>,
    intake: Receiver<JobId>,
    active: KeyedPriorityQueue<JobId, Rank>,
    poll_interval: Duration,
    events: Option<Sender<SchedEvent>>,
    observer: Observer,
}

/// Handle to a running [`PriorityScheduler`] thread.
#[derive(Debug)]
pub struct PriorityService {
    handle: JoinHandle<()>,
}

impl PriorityService {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl PriorityScheduler {
    pub fn new(
        registry: Arc<Registry>,
        control: Arc<dyn ProcessControl>,
        intake: Receiver<JobId>,
        poll_interval: Duration,
    ) -> Self {
        assert!(!poll_interval.is_zero(), "poll interval must be positive");
        Self {
            registry,
            control,
            intake,
            active: KeyedPriorityQueue::new(),
            poll_interval,
            events: None,
            observer: Observer::new(),
        }
    }

    /// Mirror every scheduling decision into `events`.
    pub fn with_events(mut self, events: Sender<SchedEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn spawn(self) -> io::Result<PriorityService> {
        thread::Builder::new()
            .name("priority-scheduler".into())
            .spawn(move || self.run())
            .map(|handle| PriorityService { handle })
    }

    /// Service loop. Returns once every intake sender is gone and nothing is
    /// left to run.
    pub fn run(mut self) {
        log::info!("priority scheduler started");
        loop {
            if self.active.is_empty() {
                match self.intake.recv() {
                    Ok(id) => self.admit(id),
                    Err(_) => break,
                }
            }
            while let Ok(id) = self.intake.try_recv() {
                self.admit(id);
            }
            if let Some((id, rank)) = self.pick_next() {
                self.serve(id, rank);
            }
        }
        log::info!("priority scheduler stopped: intake closed");
    }

    fn serve(&mut self, id: JobId, rank: Rank) {
        let (mut current, mut rank) = (id, rank);
        let mut slice_start = Instant::now();
        if !self.dispatch(current, slice_start) {
            return;
        }

        loop {
            if !self.still_running(current) {
                self.complete(current, slice_start);
                return;
            }
            match self.intake.try_recv() {
                Ok(arrival) => {
                    let Some(arrival_rank) = self.inspect(arrival) else {
                        continue;
                    };
                    if arrival_rank.priority > rank.priority {
                        let now = Instant::now();
                        self.preempt(current, rank, arrival, slice_start, now);
                        (current, rank, slice_start) = (arrival, arrival_rank, now);
                        if !self.dispatch(current, now) {
                            return;
                        }
                    } else {
                        self.park(arrival, arrival_rank);
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }

    fn admit(&mut self, id: JobId) {
        if let Some(rank) = self.inspect(id) {
            self.park(id, rank);
        }
    }

    /// Highest-ranked job whose process is still alive.
    fn pick_next(&mut self) -> Option<(JobId, Rank)> {
        while let Some((id, rank)) = self.active.pop() {
            if self.inspect(id).is_some() {
                return Some((id, rank));
            }
        }
        None
    }

    // Rank of a live job; retires the job if its process is gone.
    fn inspect(&mut self, id: JobId) -> Option<Rank> {
        let control = &self.control;
        let outcome = self.registry.with_job(id, |job| {
            if !job.status.is_terminal() && control.is_alive(&mut job.process) {
                return Some(Rank {
                    priority: job.priority.unwrap_or_default(),
                    id,
                });
            }
            job.mark_completed(Instant::now());
            None
        });
        match outcome {
            Ok(Some(rank)) => Some(rank),
            Ok(None) => {
                self.emit(SchedEvent::Discarded { job: id });
                None
            }
            Err(err) => {
                log::warn!("dropping admission: {err}");
                None
            }
        }
    }

    // Suspend a waiting job and keep it in the active set.
    fn park(&mut self, id: JobId, rank: Rank) {
        let control = &self.control;
        let parked = self.registry.with_job(id, |job| {
            match control.suspend(&mut job.process) {
                Ok(()) => {
                    job.mark_stopped();
                    true
                }
                Err(err) => {
                    log::warn!("job {id}: suspend failed, treating as complete: {err}");
                    job.mark_completed(Instant::now());
                    false
                }
            }
        });
        if let Ok(true) = parked {
            self.active.push(id, rank);
        } else {
            self.emit(SchedEvent::Discarded { job: id });
        }
    }

    fn dispatch(&mut self, id: JobId, now: Instant) -> bool {
        let control = &self.control;
        let dispatched = self.registry.with_job(id, |job| {
            if job.status.is_terminal() || !control.is_alive(&mut job.process) {
                job.mark_completed(now);
                return false;
            }
            job.mark_dispatched(now);
            if let Err(err) = control.resume(&mut job.process) {
                log::warn!("job {id}: resume failed, treating as complete: {err}");
                job.mark_completed(now);
                return false;
            }
            true
        });
        if !matches!(dispatched, Ok(true)) {
            self.emit(SchedEvent::Completed { job: id });
            return false;
        }
        log::info!("running job {id}");
        self.emit(SchedEvent::Dispatched { job: id });
        self.check_exclusive(id);
        true
    }

    fn still_running(&self, id: JobId) -> bool {
        let control = &self.control;
        self.registry
            .with_job(id, |job| {
                !job.status.is_terminal() && control.is_alive(&mut job.process)
            })
            .unwrap_or(false)
    }

    fn preempt(&mut self, id: JobId, rank: Rank, by: JobId, slice_start: Instant, now: Instant) {
        let control = &self.control;
        let requeue = self.registry.with_job(id, |job| {
            job.add_run_time(now.saturating_duration_since(slice_start));
            if job.status.is_terminal() {
                return false;
            }
            match control.suspend(&mut job.process) {
                Ok(()) => {
                    job.mark_stopped();
                    true
                }
                Err(err) => {
                    log::warn!("job {id}: suspend on preemption failed, treating as complete: {err}");
                    job.mark_completed(now);
                    false
                }
            }
        });
        log::info!("preempting job {id} for job {by}");
        self.emit(SchedEvent::Preempted { job: id, by });
        if let Ok(true) = requeue {
            self.active.push(id, rank);
        }
    }

    fn complete(&mut self, id: JobId, slice_start: Instant) {
        let now = Instant::now();
        let _ = self.registry.with_job(id, |job| {
            job.add_run_time(now.saturating_duration_since(slice_start));
            job.mark_completed(now);
        });
        log::info!("job {id} completed");
        self.emit(SchedEvent::Completed { job: id });
    }

    fn check_exclusive(&mut self, current: JobId) {
        let managed: Vec<_> = self
            .active
            .iter()
            .map(|(id, _)| *id)
            .chain(std::iter::once(current))
            .filter_map(|id| self.registry.get(id).ok())
            .collect();
        if !self.observer.observe_exclusive(&managed) {
            log::warn!("more than one managed job running while job {current} holds the CPU");
        }
    }

    fn emit(&self, event: SchedEvent) {
        log::debug!("{event:?}");
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
