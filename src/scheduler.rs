//! The conservative event scheduler and its concurrency model.
//!
//! One worker thread per partition (`std::thread::scope`, no runtime),
//! coordinating through per-partition `crossbeam_channel` inboxes and a
//! shared array of atomically-published local virtual times. This is the
//! largest module in the crate and the one every other module exists to
//! serve: [`run`] wires a [`Config`] into partitioned [`Lp`]s, drives the
//! out-of-band collectives around the scheduling phase, and returns the
//! assembled [`Report`].

use crate::collective;
use crate::collective::CollectiveChannels;
use crate::config::Config;
use crate::config::PartitionStrategy;
use crate::error::PholdError;
use crate::error::PholdResult;
use crate::event::Event;
use crate::link::Link;
use crate::link::Message;
use crate::lp::Dispatch;
use crate::lp::Lp;
use crate::rng::Tick;
use crate::stats::LpReport;
use crate::stats::Report;
use crossbeam_channel::Receiver;
use crossbeam_channel::unbounded;
use rayon::prelude::*;
use std::cmp::Ordering as CmpOrdering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Shared coordination barrier for fatal errors. The first partition to
/// fault stores its error here and flips `faulted`; every other partition
/// notices on its next loop iteration (at most one `recv_timeout` tick
/// later) and unwinds with the same error rather than blocking forever on a
/// peer that has died.
struct FaultBarrier {
    faulted: AtomicBool,
    first: Mutex<Option<PholdError>>,
}

impl FaultBarrier {
    fn new() -> Self {
        FaultBarrier {
            faulted: AtomicBool::new(false),
            first: Mutex::new(None),
        }
    }

    fn report(&self, err: PholdError) -> PholdError {
        let mut guard = self.first.lock().expect("fault mutex poisoned");
        if guard.is_none() {
            *guard = Some(err.clone());
        }
        drop(guard);
        self.faulted.store(true, Ordering::Release);
        err
    }

    fn check(&self) -> Option<PholdError> {
        if self.faulted.load(Ordering::Acquire) {
            self.first.lock().expect("fault mutex poisoned").clone()
        } else {
            None
        }
    }
}

/// Per-partition state machine. Tracked only for logging — the dispatch
/// loop below is the actual source of truth for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartitionState {
    Init,
    Running,
    Blocked,
    Draining,
    Terminated,
}

struct QueuedEvent {
    arrival: Tick,
    sequence: u64,
    target: usize,
    from_id: u64,
    event: Event,
}

impl QueuedEvent {
    fn key(&self) -> (Tick, u64) {
        (self.arrival, self.sequence)
    }
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

fn block_partition(id: u64, n: u64, partitions: usize) -> usize {
    let partitions = partitions as u64;
    let base = n / partitions;
    let remainder = n % partitions;
    // The first `remainder` partitions absorb one extra LP each, keeping
    // every partition's id range contiguous.
    let boundary = remainder * (base + 1);
    if id < boundary {
        (id / (base + 1)) as usize
    } else {
        (remainder + (id - boundary) / base) as usize
    }
}

fn assign_partition(id: u64, n: u64, partitions: usize, strategy: PartitionStrategy) -> usize {
    match strategy {
        PartitionStrategy::Block => block_partition(id, n, partitions),
        PartitionStrategy::RoundRobin => (id as usize) % partitions,
    }
}

/// The lower-bound time stamp for partition `P`: the earliest arrival time
/// any peer could still deliver, given their published local virtual times
/// and the global lookahead. A single-partition run has no peers, so it is
/// never barrier-limited.
fn compute_lbts(own: usize, lvts: &[AtomicU64], minimum: Tick) -> Tick {
    if lvts.len() <= 1 {
        return Tick::MAX;
    }
    lvts.iter()
        .enumerate()
        .filter(|(i, _)| *i != own)
        .map(|(_, lvt)| lvt.load(Ordering::Acquire))
        .min()
        .map(|min_peer| min_peer.saturating_add(minimum))
        .unwrap_or(Tick::MAX)
}

/// Drives one partition's dispatch loop until it is authorized to
/// terminate. Returns the partition's LPs with their final counters, or the
/// first fatal error observed.
fn run_partition(
    p_idx: usize,
    mut lps: Vec<Lp>,
    inbox: &Receiver<Message>,
    lvts: &[AtomicU64],
    live_tokens: &AtomicUsize,
    barrier: &FaultBarrier,
    cfg: &Config,
) -> PholdResult<Vec<Lp>> {
    let id_to_local: HashMap<u64, usize> =
        lps.iter().enumerate().map(|(i, lp)| (lp.id, i)).collect();
    let mut queue: BinaryHeap<Reverse<QueuedEvent>> = BinaryHeap::new();
    let mut sequence: u64 = 0;
    let mut released = vec![false; lps.len()];
    let mut state = PartitionState::Init;

    for (local_idx, lp) in lps.iter_mut().enumerate() {
        let dispatches = match lp.setup(cfg.events) {
            Ok(dispatches) => dispatches,
            Err(e) => return Err(barrier.report(e)),
        };
        for dispatch in dispatches {
            if let Dispatch::Local { arrival, event } = dispatch {
                queue.push(Reverse(QueuedEvent {
                    arrival,
                    sequence,
                    target: local_idx,
                    from_id: lp.id,
                    event,
                }));
                sequence += 1;
            }
        }
    }

    let mut local_lvt: Tick = 0;
    lvts[p_idx].store(local_lvt, Ordering::Release);
    state = PartitionState::Running;
    log::info!("partition {p_idx} Init -> Running ({} LPs)", lps.len());

    loop {
        if let Some(err) = barrier.check() {
            log::error!("partition {p_idx} Running -> Terminated (peer fault: {err})");
            return Err(err);
        }

        while let Ok(msg) = inbox.try_recv() {
            if msg.arrival < local_lvt {
                return Err(barrier.report(PholdError::CausalityViolation {
                    partition: p_idx,
                    arrival: msg.arrival,
                    lvt: local_lvt,
                }));
            }
            let target = *id_to_local
                .get(&msg.destination)
                .expect("inbound message routed to the wrong partition");
            queue.push(Reverse(QueuedEvent {
                arrival: msg.arrival,
                sequence,
                target,
                from_id: u64::MAX,
                event: msg.event,
            }));
            sequence += 1;
        }

        let lbts = compute_lbts(p_idx, lvts, cfg.minimum);
        let tokens_released = live_tokens.load(Ordering::Acquire) == 0;
        let head_arrival = queue.peek().map(|Reverse(qe)| qe.arrival);

        match head_arrival {
            None if tokens_released => {
                state = PartitionState::Terminated;
                lvts[p_idx].store(Tick::MAX, Ordering::Release);
                log::info!("partition {p_idx} Draining -> Terminated (queue drained)");
                break;
            }
            None => {
                if state != PartitionState::Blocked {
                    log::debug!("partition {p_idx} Running -> Blocked (empty queue)");
                    state = PartitionState::Blocked;
                }
                let _ = inbox.recv_timeout(Duration::from_micros(50));
            }
            Some(arrival) if arrival < local_lvt => {
                return Err(barrier.report(PholdError::CausalityViolation {
                    partition: p_idx,
                    arrival,
                    lvt: local_lvt,
                }));
            }
            Some(arrival) if arrival >= cfg.stop && tokens_released => {
                state = PartitionState::Draining;
                lvts[p_idx].store(Tick::MAX, Ordering::Release);
                log::info!("partition {p_idx} Running -> Draining -> Terminated (head past stop)");
                break;
            }
            Some(arrival) if arrival <= lbts => {
                if state != PartitionState::Running {
                    log::debug!("partition {p_idx} Blocked -> Running (barrier advanced)");
                    state = PartitionState::Running;
                }
                let Reverse(head) = queue.pop().expect("head was just peeked");
                local_lvt = local_lvt.max(head.arrival);
                lvts[p_idx].store(local_lvt, Ordering::Release);

                let target = head.target;
                let lp_id = lps[target].id;
                if let Some(dispatch) = lps[target].handle_event(head.arrival, head.event, head.from_id) {
                    if let Dispatch::Local { arrival, event } = dispatch {
                        queue.push(Reverse(QueuedEvent {
                            arrival,
                            sequence,
                            target,
                            from_id: lp_id,
                            event,
                        }));
                        sequence += 1;
                    }
                } else if !released[target] {
                    released[target] = true;
                    live_tokens.fetch_sub(1, Ordering::AcqRel);
                    log::debug!("partition {p_idx} lp {lp_id} released its do-not-end token");
                }
            }
            Some(_) => {
                if state != PartitionState::Blocked {
                    log::debug!("partition {p_idx} Running -> Blocked (head exceeds lbts={lbts})");
                    state = PartitionState::Blocked;
                }
                let _ = inbox.recv_timeout(Duration::from_micros(50));
            }
        }
    }

    Ok(lps)
}

/// Runs a full PHOLD simulation end to end: partitions the LPs, runs the
/// init broadcast, drives every partition's dispatch loop to completion,
/// runs the completion reduce, and assembles the [`Report`].
pub fn run(cfg: &Config) -> PholdResult<Report> {
    let n = cfg.number;
    let partition_of: Vec<usize> = (0..n)
        .map(|id| assign_partition(id, n, cfg.partitions, cfg.partition_strategy))
        .collect();

    let mut inbox_senders = Vec::with_capacity(cfg.partitions);
    let mut inbox_receivers = Vec::with_capacity(cfg.partitions);
    for _ in 0..cfg.partitions {
        let (tx, rx) = unbounded();
        inbox_senders.push(tx);
        inbox_receivers.push(rx);
    }

    // Link construction is an embarrassingly parallel O(N) batch of O(N)
    // work each (every LP wires up a link to every peer); data-parallel
    // per-id like the teacher's clustering batch passes, not worth a
    // dedicated thread pool of its own.
    let mut lps: Vec<Option<Lp>> = (0..n)
        .into_par_iter()
        .map(|id| {
            let links = (0..n)
                .map(|peer| {
                    if peer == id {
                        Link::self_link(id)
                    } else {
                        Link::cross(
                            id,
                            peer,
                            cfg.minimum,
                            inbox_senders[partition_of[peer as usize]].clone(),
                        )
                    }
                })
                .collect();
            Some(Lp::init_construct(cfg, id, links))
        })
        .collect();

    let mut partitions: Vec<Vec<Lp>> = (0..cfg.partitions).map(|_| Vec::new()).collect();
    for id in 0..n {
        let p = partition_of[id as usize];
        partitions[p].push(lps[id as usize].take().expect("each id visited once"));
    }

    let init_channels = CollectiveChannels::new(n);
    collective::broadcast_init(n, &init_channels)?;
    log::info!("init broadcast complete across {n} LPs");

    let lvts: Vec<AtomicU64> = (0..cfg.partitions).map(|_| AtomicU64::new(0)).collect();
    let live_tokens = AtomicUsize::new(n as usize);
    let barrier = FaultBarrier::new();

    let partition_results: Vec<PholdResult<Vec<Lp>>> = thread::scope(|scope| {
        let handles: Vec<_> = partitions
            .into_iter()
            .enumerate()
            .map(|(p_idx, partition_lps)| {
                let inbox = &inbox_receivers[p_idx];
                let lvts_ref = &lvts;
                let live_tokens_ref = &live_tokens;
                let barrier_ref = &barrier;
                scope.spawn(move || {
                    run_partition(p_idx, partition_lps, inbox, lvts_ref, live_tokens_ref, barrier_ref, cfg)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("partition worker thread panicked"))
            .collect()
    });

    let mut all_lps = Vec::with_capacity(n as usize);
    for result in partition_results {
        all_lps.extend(result?);
    }
    all_lps.sort_by_key(|lp| lp.id);

    let mut totals: Vec<(u64, u64)> = all_lps.iter().map(|lp| (lp.send_count, lp.recv_count)).collect();
    let complete_channels = CollectiveChannels::new(n);
    let (grand_send, grand_recv) = collective::reduce_complete(n, &mut totals, &complete_channels)?;
    log::debug!("complete reduce grand totals: send={grand_send} recv={grand_recv}");

    let lp_reports: Vec<LpReport> = all_lps
        .into_iter()
        .map(|lp| LpReport {
            id: lp.id,
            send_count: lp.send_count,
            recv_count: lp.recv_count,
            histogram: lp.histogram().cloned(),
        })
        .collect();

    Ok(Report::assemble(cfg, lp_reports, grand_send, grand_recv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_partition_keeps_contiguous_ranges() {
        // 7 LPs over 3 partitions: sizes 3, 2, 2.
        let assignments: Vec<usize> = (0..7).map(|id| block_partition(id, 7, 3)).collect();
        assert_eq!(assignments, vec![0, 0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn block_partition_evenly_divides() {
        let assignments: Vec<usize> = (0..8).map(|id| block_partition(id, 8, 4)).collect();
        assert_eq!(assignments, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn compute_lbts_is_unbounded_for_single_partition() {
        let lvts = vec![AtomicU64::new(0)];
        assert_eq!(compute_lbts(0, &lvts, 5), Tick::MAX);
    }

    #[test]
    fn compute_lbts_uses_slowest_peer() {
        let lvts = vec![AtomicU64::new(100), AtomicU64::new(40), AtomicU64::new(70)];
        assert_eq!(compute_lbts(0, &lvts, 5), 45);
    }
}
