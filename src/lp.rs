//! The logical process state machine.
//!
//! One [`Lp`] per logical process. It owns no thread and no queue — the
//! scheduler drives it by calling `setup`/`handle_event` and deciding what to
//! do with the [`Dispatch`] values they hand back (enqueue locally for a
//! self-send, or nothing further for a remote send, which the link already
//! pushed onto its destination's channel).

use crate::config::Config;
use crate::error::PholdError;
use crate::error::PholdResult;
use crate::event::Event;
use crate::link::Link;
use crate::rng::Lcg;
use crate::rng::Tick;
use crate::stats::Histogram;

/// Bounded retry budget for `setup()`'s "at least one live event" guarantee.
/// Past this many draws without a sub-`stop` arrival, the RNG parameters and
/// `stop` are judged incompatible rather than unlucky.
const MAX_LIVE_EVENT_ATTEMPTS: usize = 10_000;

/// What an LP did with a freshly generated event: either it landed on this
/// LP's own partition queue (self-send) or it has already gone out over a
/// [`Link`] to another partition.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Local { arrival: Tick, event: Event },
    Remote { arrival: Tick },
}

impl Dispatch {
    pub fn arrival(&self) -> Tick {
        match self {
            Dispatch::Local { arrival, .. } => *arrival,
            Dispatch::Remote { arrival } => *arrival,
        }
    }
}

pub struct Lp {
    pub id: u64,
    number: u64,
    remote: f64,
    minimum: Tick,
    average: f64,
    stop: Tick,
    buffer_bytes: usize,
    rng: Lcg,
    links: Vec<Link>,
    pub send_count: u64,
    pub recv_count: u64,
    histogram: Option<Histogram>,
    authorized_to_end: bool,
}

impl Lp {
    /// Sets up RNG, counters, and statistics handles; no events are
    /// scheduled yet. `links` must be indexed by peer id with `links[id]`
    /// the self-link.
    pub fn init_construct(cfg: &Config, id: u64, links: Vec<Link>) -> Lp {
        assert_eq!(links.len(), cfg.number as usize);
        assert!(links[id as usize].is_self(), "links[id] must be the self-link");
        Lp {
            id,
            number: cfg.number,
            remote: cfg.remote,
            minimum: cfg.minimum,
            average: cfg.average,
            stop: cfg.stop,
            buffer_bytes: cfg.buffer_bytes,
            rng: Lcg::for_lp(id),
            links,
            send_count: 0,
            recv_count: 0,
            histogram: if cfg.delays_out { Some(Histogram::new()) } else { None },
            authorized_to_end: false,
        }
    }

    pub fn authorized_to_end(&self) -> bool {
        self.authorized_to_end
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    /// Emits `events` initial PHOLD events, then keeps drawing past that
    /// count until at least one has arrival strictly before `stop`.
    pub fn setup(&mut self, events: u64) -> PholdResult<Vec<Dispatch>> {
        let mut dispatches = Vec::with_capacity(events as usize);
        let mut attempts = 0usize;
        for _ in 0..events {
            dispatches.push(self.send_event(0));
            attempts += 1;
        }
        while !dispatches.iter().any(|d| d.arrival() < self.stop) {
            if attempts >= MAX_LIVE_EVENT_ATTEMPTS {
                return Err(PholdError::StopReachedWithoutLiveEvent {
                    lp: self.id as usize,
                    attempts,
                });
            }
            dispatches.push(self.send_event(0));
            attempts += 1;
        }
        Ok(dispatches)
    }

    /// Called in virtual-time order by the scheduler. Returns the follow-up
    /// dispatch when the LP is still live, or `None` once it has released
    /// its do-not-end token.
    pub fn handle_event(&mut self, now: Tick, _event: Event, _from_id: u64) -> Option<Dispatch> {
        if now < self.stop {
            self.recv_count += 1;
            Some(self.send_event(now))
        } else {
            self.authorized_to_end = true;
            None
        }
    }

    /// Draws the remote/local coin, a destination if remote, and a delay;
    /// submits the event over the chosen link.
    pub fn send_event(&mut self, now: Tick) -> Dispatch {
        let rem = self.rng.unit();
        let destination = if rem < self.remote {
            self.rng.uniform_excluding(self.number, self.id)
        } else {
            self.id
        };

        let delay = self.rng.exponential(self.average);
        let delay_total = delay + self.minimum;
        let payload = Event::Phold {
            send_time: now,
            payload_bytes: vec![0u8; self.buffer_bytes],
        };

        let link = &self.links[destination as usize];
        let dispatch = if link.is_self() {
            let (arrival, event) = link
                .send(now, delay_total, payload)
                .expect("self link always resolves locally");
            Dispatch::Local { arrival, event }
        } else {
            let arrival = now + link.latency + delay;
            link.send(now, delay, payload);
            Dispatch::Remote { arrival }
        };

        self.send_count += 1;
        if dispatch.arrival() < self.stop {
            if let Some(histogram) = &mut self.histogram {
                histogram.record(delay_total);
            }
        }
        dispatch
    }
}
