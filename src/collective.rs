//! Phased broadcast and reduce collectives run outside virtual time.
//!
//! Two phased collectives over the tree indexing of [`crate::tree`], run
//! outside virtual time: an init broadcast before the scheduler starts and a
//! completion reduce after it drains. Both are driven here as a sequential
//! walk over LP ids, phase by phase — the protocol is lock-step by
//! construction (every LP at a given tree depth is only ever touched during
//! its own phase), so no worker threads are needed to get the early/late
//! fatal checks right.

use crate::error::PholdError;
use crate::error::PholdResult;
use crate::event::Event;
use crate::tree;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::unbounded;

/// One inbox per LP, shared across both collectives in a run.
pub struct CollectiveChannels {
    senders: Vec<Sender<Event>>,
    receivers: Vec<Receiver<Event>>,
}

impl CollectiveChannels {
    pub fn new(n: u64) -> CollectiveChannels {
        let (senders, receivers) = (0..n).map(|_| unbounded()).unzip();
        CollectiveChannels { senders, receivers }
    }
}

fn max_depth(n: u64) -> u32 {
    tree::depth(n as usize - 1)
}

/// Init broadcast, root (id 0) to leaves. Returns `Ok(())` once every LP has
/// received exactly one `Init` from its parent (or, for id 0, initiated).
///
/// Each phase is driven as two separate passes over every LP: first every LP
/// checks what it should (or should not) have received by now, then every LP
/// whose depth matches this phase forwards `Init` to its children. Keeping
/// the receive/check pass and the send pass apart like this matters: a
/// parent and its children can share a phase only at the root (`depth(0) ==
/// 0`), and if sends and checks were interleaved in a single pass, the
/// root's send to its children would land in their inbox before the same
/// phase's "nothing arrived early" check ever looked — tripping that check
/// against a message that is not early at all, just delivered a pass too
/// soon.
pub fn broadcast_init(n: u64, channels: &CollectiveChannels) -> PholdResult<()> {
    let depth_limit = max_depth(n);
    for phase in 0..=depth_limit {
        for id in 0..n {
            let d = tree::depth(id as usize);
            if d == phase {
                if id != 0 {
                    let expected_parent = tree::parent(id as usize) as u64;
                    match channels.receivers[id as usize].try_recv() {
                        Ok(Event::Init { sender_id }) if sender_id == expected_parent => {}
                        Ok(_) => {
                            return Err(PholdError::CollectiveProtocolViolation {
                                lp: id as usize,
                                phase: phase as usize,
                                reason: "init broadcast received wrong sender or event type"
                                    .to_string(),
                            });
                        }
                        Err(_) => {
                            return Err(PholdError::CollectiveProtocolViolation {
                                lp: id as usize,
                                phase: phase as usize,
                                reason: "init broadcast expected a message from parent, found none"
                                    .to_string(),
                            });
                        }
                    }
                }
            } else if d < phase {
                if channels.receivers[id as usize].try_recv().is_ok() {
                    return Err(PholdError::CollectiveProtocolViolation {
                        lp: id as usize,
                        phase: phase as usize,
                        reason: "unexpected late init message".to_string(),
                    });
                }
            } else if channels.receivers[id as usize].try_recv().is_ok() {
                return Err(PholdError::CollectiveProtocolViolation {
                    lp: id as usize,
                    phase: phase as usize,
                    reason: "unexpected early init message".to_string(),
                });
            }
        }

        for id in 0..n {
            if tree::depth(id as usize) != phase {
                continue;
            }
            let (left, right) = tree::children(id as usize);
            for child in [left, right] {
                if (child as u64) < n {
                    // Every receiver lives in `channels` for the whole broadcast, so
                    // this can only fail if the channel was already closed by a bug
                    // elsewhere in the collective; either way there is nothing more
                    // useful to do here than let the missing message surface as the
                    // receiving LP's own "expected a message, found none" violation.
                    channels.senders[child]
                        .send(Event::Init { sender_id: id })
                        .ok();
                }
            }
        }
    }
    Ok(())
}

/// Completion reduce, leaves to root. `totals[i]` is LP `i`'s own
/// `(send_count, recv_count)` before folding in its children's contributions.
/// Returns the grand `(send_total, recv_total)` collected at the root.
pub fn reduce_complete(
    n: u64,
    totals: &mut [(u64, u64)],
    channels: &CollectiveChannels,
) -> PholdResult<(u64, u64)> {
    let depth_limit = max_depth(n);
    for p in 0..=depth_limit {
        let effective_phase = depth_limit - p;
        for id in 0..n {
            let d = tree::depth(id as usize);
            if d == effective_phase {
                let (left, right) = tree::children(id as usize);
                for child in [left, right] {
                    if (child as u64) < n {
                        match channels.receivers[id as usize].try_recv() {
                            Ok(Event::Complete { send_count, recv_count }) => {
                                totals[id as usize].0 += send_count;
                                totals[id as usize].1 += recv_count;
                            }
                            Ok(_) => {
                                return Err(PholdError::CollectiveProtocolViolation {
                                    lp: id as usize,
                                    phase: p as usize,
                                    reason: "complete reduce received wrong event type".to_string(),
                                });
                            }
                            Err(_) => {
                                return Err(PholdError::CollectiveProtocolViolation {
                                    lp: id as usize,
                                    phase: p as usize,
                                    reason: "complete reduce expected a message from child, found none"
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                if id != 0 {
                    let parent = tree::parent(id as usize) as u64;
                    let (send_count, recv_count) = totals[id as usize];
                    // As in `broadcast_init`: the parent's receiver outlives this
                    // send for the whole reduce, so a failed send here can only mean
                    // the channel was already torn down by an earlier bug, which the
                    // parent's own "expected a message, found none" check will catch.
                    channels.senders[parent as usize]
                        .send(Event::Complete { send_count, recv_count })
                        .ok();
                }
            } else if d > effective_phase && channels.receivers[id as usize].try_recv().is_ok() {
                return Err(PholdError::CollectiveProtocolViolation {
                    lp: id as usize,
                    phase: p as usize,
                    reason: "unexpected late complete message".to_string(),
                });
            } else if d < effective_phase && channels.receivers[id as usize].try_recv().is_ok() {
                return Err(PholdError::CollectiveProtocolViolation {
                    lp: id as usize,
                    phase: p as usize,
                    reason: "unexpected early complete message".to_string(),
                });
            }
        }
    }
    Ok(totals[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_balanced_tree() {
        let n = 8;
        let channels = CollectiveChannels::new(n);
        assert!(broadcast_init(n, &channels).is_ok());
    }

    #[test]
    fn broadcast_reaches_unbalanced_tree_of_seven() {
        let n = 7;
        let channels = CollectiveChannels::new(n);
        assert!(broadcast_init(n, &channels).is_ok());
    }

    #[test]
    fn broadcast_reaches_minimal_two_lp_tree() {
        // The smallest valid N: root and its one child share phase 0's send
        // pass immediately after phase 0's own check pass runs.
        let n = 2;
        let channels = CollectiveChannels::new(n);
        assert!(broadcast_init(n, &channels).is_ok());
    }

    #[test]
    fn broadcast_succeeds_for_every_n_from_two_to_sixteen() {
        for n in 2..=16u64 {
            let channels = CollectiveChannels::new(n);
            assert!(broadcast_init(n, &channels).is_ok(), "broadcast failed for n={n}");
        }
    }

    #[test]
    fn reduce_sums_with_zero_loss() {
        let n = 7;
        let channels = CollectiveChannels::new(n);
        let mut totals: Vec<(u64, u64)> = (0..n).map(|_| (10, 10)).collect();
        let (send_total, recv_total) = reduce_complete(n, &mut totals, &channels).unwrap();
        assert_eq!(send_total, 10 * n);
        assert_eq!(recv_total, 10 * n);
    }

    #[test]
    fn collectives_complete_in_max_depth_plus_one_phases() {
        let n = 7;
        assert_eq!(max_depth(n) + 1, 3);
    }
}
