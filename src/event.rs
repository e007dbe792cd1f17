//! The closed set of event shapes that cross partition boundaries, and
//! their wire format.
//!
//! Three closed variants cross partition boundaries on
//! [`crossbeam_channel`](crossbeam_channel) channels. The wire encoding below
//! is what would travel over an actual inter-process transport; in-process
//! the enum itself is moved through the channel, but `encode`/`decode` still
//! round-trip it exactly, which is what the scenario tests check.

use crate::rng::Tick;
use serde::Deserialize;
use serde::Serialize;

const TAG_PHOLD: u8 = 0;
const TAG_INIT: u8 = 1;
const TAG_COMPLETE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Phold { send_time: Tick, payload_bytes: Vec<u8> },
    Init { sender_id: u64 },
    Complete { send_count: u64, recv_count: u64 },
}

impl Event {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Event::Phold { send_time, payload_bytes } => {
                out.push(TAG_PHOLD);
                out.extend_from_slice(&send_time.to_le_bytes());
                out.extend_from_slice(&(payload_bytes.len() as u64).to_le_bytes());
                out.extend_from_slice(payload_bytes);
            }
            Event::Init { sender_id } => {
                out.push(TAG_INIT);
                out.extend_from_slice(&sender_id.to_le_bytes());
            }
            Event::Complete { send_count, recv_count } => {
                out.push(TAG_COMPLETE);
                out.extend_from_slice(&send_count.to_le_bytes());
                out.extend_from_slice(&recv_count.to_le_bytes());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Event> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            TAG_PHOLD => {
                let send_time = take_u64(rest)?;
                let rest = &rest[8..];
                let payload_len = take_u64(rest)? as usize;
                let rest = &rest[8..];
                if rest.len() != payload_len {
                    return None;
                }
                Some(Event::Phold {
                    send_time,
                    payload_bytes: rest.to_vec(),
                })
            }
            TAG_INIT => {
                let sender_id = take_u64(rest)?;
                if rest.len() != 8 {
                    return None;
                }
                Some(Event::Init { sender_id })
            }
            TAG_COMPLETE => {
                let send_count = take_u64(rest)?;
                let recv_count = take_u64(&rest[8..])?;
                if rest.len() != 16 {
                    return None;
                }
                Some(Event::Complete { send_count, recv_count })
            }
            _ => None,
        }
    }
}

fn take_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.get(0..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phold_round_trips() {
        let e = Event::Phold {
            send_time: 42,
            payload_bytes: vec![1, 2, 3, 4, 5],
        };
        assert_eq!(Event::decode(&e.encode()), Some(e));
    }

    #[test]
    fn phold_round_trips_with_empty_payload() {
        let e = Event::Phold {
            send_time: 0,
            payload_bytes: Vec::new(),
        };
        assert_eq!(Event::decode(&e.encode()), Some(e));
    }

    #[test]
    fn init_round_trips() {
        let e = Event::Init { sender_id: 7 };
        assert_eq!(Event::decode(&e.encode()), Some(e));
    }

    #[test]
    fn complete_round_trips() {
        let e = Event::Complete {
            send_count: 1000,
            recv_count: 998,
        };
        assert_eq!(Event::decode(&e.encode()), Some(e));
    }

    #[test]
    fn decode_rejects_truncated_bytes() {
        let e = Event::Init { sender_id: 3 };
        let mut bytes = e.encode();
        bytes.pop();
        assert_eq!(Event::decode(&bytes), None);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        assert_eq!(Event::decode(&[9, 0, 0]), None);
    }
}
