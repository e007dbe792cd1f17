//! A directed, latency-carrying channel from one LP to another (or to
//! itself). It does not own a queue — it knows how to turn a
//! `(now, delay, event)` triple into an arrival time, and how to get the
//! event to wherever it is dispatched from: either a local hand-off (for a
//! self-link, consumed directly by the owning partition) or a
//! [`crossbeam_channel`] send to the destination partition's worker.

use crate::event::Event;
use crate::rng::Tick;
use crossbeam_channel::Sender;

/// A cross-partition wire message: the destination LP, its computed arrival
/// time, and the event payload. The enqueue sequence number is assigned by
/// the receiving partition's pending queue at enqueue time, not here.
#[derive(Debug, Clone)]
pub struct Message {
    pub destination: u64,
    pub arrival: Tick,
    pub event: Event,
}

enum Route {
    SelfLink,
    Remote(Sender<Message>),
}

pub struct Link {
    pub source: u64,
    pub destination: u64,
    /// `minimum` for cross-LP links, `0` for the self-link.
    pub latency: Tick,
    route: Route,
}

impl Link {
    pub fn self_link(id: u64) -> Link {
        Link {
            source: id,
            destination: id,
            latency: 0,
            route: Route::SelfLink,
        }
    }

    pub fn cross(source: u64, destination: u64, minimum: Tick, sender: Sender<Message>) -> Link {
        assert_ne!(source, destination, "cross links must not loop back to source");
        Link {
            source,
            destination,
            latency: minimum,
            route: Route::Remote(sender),
        }
    }

    pub fn is_self(&self) -> bool {
        matches!(self.route, Route::SelfLink)
    }

    /// Schedules `event` for arrival at `now + latency + delay`. Self-links
    /// return the arrival/event pair for the caller to enqueue directly into
    /// its own partition's pending queue; cross-LP links push a [`Message`]
    /// onto the destination partition's channel and return `None`.
    pub fn send(&self, now: Tick, delay: Tick, event: Event) -> Option<(Tick, Event)> {
        let arrival = now + self.latency + delay;
        match &self.route {
            Route::SelfLink => Some((arrival, event)),
            Route::Remote(sender) => {
                // The receiving partition's inbox outlives every sender handle for
                // the whole run (the scheduler joins all partition threads before
                // any channel is dropped), so `send` only ever fails if the
                // destination partition has already panicked — in which case
                // `thread::scope` will surface that panic on join regardless of
                // whether this event made it onto the channel.
                sender
                    .send(Message {
                        destination: self.destination,
                        arrival,
                        event,
                    })
                    .ok();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_link_arrival_excludes_latency() {
        let link = Link::self_link(3);
        assert_eq!(link.latency, 0);
        let (arrival, event) = link
            .send(100, 50, Event::Init { sender_id: 3 })
            .expect("self link returns locally");
        assert_eq!(arrival, 150);
        assert_eq!(event, Event::Init { sender_id: 3 });
    }

    #[test]
    fn cross_link_arrival_includes_minimum_latency() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let link = Link::cross(0, 1, 5, tx);
        let outcome = link.send(100, 20, Event::Init { sender_id: 0 });
        assert!(outcome.is_none());
        let msg = rx.try_recv().expect("message was sent on the channel");
        assert_eq!(msg.destination, 1);
        assert_eq!(msg.arrival, 125);
    }

    #[test]
    #[should_panic]
    fn cross_link_cannot_loop_back_to_source() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let _ = Link::cross(2, 2, 1, tx);
    }
}
