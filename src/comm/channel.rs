//! In-process transport over standard channels.
//!
//! Gives every "rank" a thread and wires them with one channel per ordered
//! rank pair, which preserves the required FIFO order per (sender, tag)
//! for free. Out-of-order arrivals (a later-posted tag delivered first) are
//! parked in a stash until their matching receive is posted.
//!
//! The min-reduction is a two-phase rendezvous on a shared cell: each
//! participant deposits its value; the last one in publishes the minimum
//! and opens the next round.
//!
//! This transport exists so multi-rank runs, and the tests that audit the
//! exchange protocol, can execute inside one process without an MPI
//! launcher. Each endpoint must stay on the thread driving its rank.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};

use super::{CommError, InboundEdge, MessageTag, OutboundEdge, Rank, Transport};

struct Message {
    tag: MessageTag,
    payload: Vec<f64>,
}

/// Shared state for the min-reduction rendezvous.
struct ReduceCell {
    state: Mutex<ReduceState>,
    ready: Condvar,
    participants: usize,
}

struct ReduceState {
    round: u64,
    arrived: usize,
    accumulator: f64,
    result: f64,
}

impl ReduceCell {
    fn new(participants: usize) -> Self {
        Self {
            state: Mutex::new(ReduceState {
                round: 0,
                arrived: 0,
                accumulator: f64::INFINITY,
                result: f64::INFINITY,
            }),
            ready: Condvar::new(),
            participants,
        }
    }

    fn reduce_min(&self, local: f64) -> f64 {
        let mut state = self.state.lock().expect("reduction lock poisoned");
        let my_round = state.round;
        state.accumulator = state.accumulator.min(local);
        state.arrived += 1;
        if state.arrived == self.participants {
            state.result = state.accumulator;
            state.accumulator = f64::INFINITY;
            state.arrived = 0;
            state.round += 1;
            self.ready.notify_all();
            return state.result;
        }
        while state.round == my_round {
            state = self.ready.wait(state).expect("reduction lock poisoned");
        }
        state.result
    }
}

/// One rank's endpoint of the in-process mesh.
pub struct ChannelTransport {
    rank: Rank,
    senders: Vec<Sender<Message>>,
    receivers: Vec<Receiver<Message>>,
    stash: RefCell<HashMap<(Rank, MessageTag), VecDeque<Vec<f64>>>>,
    reducer: Arc<ReduceCell>,
}

impl ChannelTransport {
    /// Wire up a fully-connected mesh of `ranks` endpoints.
    ///
    /// Endpoint `i` of the returned vector belongs to rank `i`; move each
    /// one onto its rank's thread.
    pub fn mesh(ranks: usize) -> Vec<ChannelTransport> {
        assert!(ranks > 0);
        let reducer = Arc::new(ReduceCell::new(ranks));

        // channels[src][dst]
        let mut tx: Vec<Vec<Option<Sender<Message>>>> = (0..ranks)
            .map(|_| (0..ranks).map(|_| None).collect())
            .collect();
        let mut rx: Vec<Vec<Option<Receiver<Message>>>> = (0..ranks)
            .map(|_| (0..ranks).map(|_| None).collect())
            .collect();
        for src in 0..ranks {
            for dst in 0..ranks {
                let (s, r) = channel();
                tx[src][dst] = Some(s);
                rx[dst][src] = Some(r);
            }
        }

        tx.into_iter()
            .zip(rx)
            .enumerate()
            .map(|(rank, (senders, receivers))| ChannelTransport {
                rank,
                senders: senders.into_iter().map(|s| s.unwrap()).collect(),
                receivers: receivers.into_iter().map(|r| r.unwrap()).collect(),
                stash: RefCell::new(HashMap::new()),
                reducer: Arc::clone(&reducer),
            })
            .collect()
    }

    fn take_stashed(&self, from: Rank, tag: MessageTag) -> Option<Vec<f64>> {
        let mut stash = self.stash.borrow_mut();
        let queue = stash.get_mut(&(from, tag))?;
        let payload = queue.pop_front();
        if queue.is_empty() {
            stash.remove(&(from, tag));
        }
        payload
    }

    fn recv_matching(&self, want: &InboundEdge) -> Result<Vec<f64>, CommError> {
        if let Some(payload) = self.take_stashed(want.from, want.tag) {
            return Ok(payload);
        }
        loop {
            let msg = self.receivers[want.from].recv().map_err(|_| {
                CommError::Transport {
                    rank: self.rank,
                    detail: format!("peer rank {} disconnected", want.from),
                }
            })?;
            if msg.tag == want.tag {
                return Ok(msg.payload);
            }
            self.stash
                .borrow_mut()
                .entry((want.from, msg.tag))
                .or_default()
                .push_back(msg.payload);
        }
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.senders.len()
    }

    fn exchange(
        &self,
        sends: Vec<OutboundEdge>,
        recvs: &[InboundEdge],
    ) -> Result<Vec<Vec<f64>>, CommError> {
        for send in sends {
            if send.to >= self.senders.len() {
                return Err(CommError::NoRoute {
                    rank: self.rank,
                    to: send.to,
                });
            }
            self.senders[send.to]
                .send(Message {
                    tag: send.tag,
                    payload: send.payload,
                })
                .map_err(|_| CommError::Transport {
                    rank: self.rank,
                    detail: format!("peer rank {} disconnected", send.to),
                })?;
        }

        let mut received = Vec::with_capacity(recvs.len());
        for want in recvs {
            let payload = self.recv_matching(want)?;
            if payload.len() != want.len {
                return Err(CommError::PayloadLength {
                    rank: self.rank,
                    tag: want.tag,
                    got: payload.len(),
                    expected: want.len,
                });
            }
            received.push(payload);
        }
        Ok(received)
    }

    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError> {
        Ok(self.reducer.reduce_min(local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{EdgeSlot, PayloadKind};
    use std::thread;

    fn tag(kind: PayloadKind, origin: f64) -> MessageTag {
        MessageTag::new(kind, EdgeSlot::Left, origin)
    }

    #[test]
    fn two_ranks_swap_payloads() {
        let mut mesh = ChannelTransport::mesh(2);
        let t1 = mesh.pop().unwrap();
        let t0 = mesh.pop().unwrap();
        let tg = tag(PayloadKind::WaterHeight, 0.0);

        let handle = thread::spawn(move || {
            let got = t1
                .exchange(
                    vec![OutboundEdge {
                        to: 0,
                        tag: tg,
                        payload: vec![4.0, 5.0],
                    }],
                    &[InboundEdge {
                        from: 0,
                        tag: tg,
                        len: 2,
                    }],
                )
                .unwrap();
            assert_eq!(got[0], vec![1.0, 2.0]);
        });

        let got = t0
            .exchange(
                vec![OutboundEdge {
                    to: 1,
                    tag: tg,
                    payload: vec![1.0, 2.0],
                }],
                &[InboundEdge {
                    from: 1,
                    tag: tg,
                    len: 2,
                }],
            )
            .unwrap();
        assert_eq!(got[0], vec![4.0, 5.0]);
        handle.join().unwrap();
    }

    #[test]
    fn out_of_order_tags_are_stashed() {
        let mut mesh = ChannelTransport::mesh(2);
        let t1 = mesh.pop().unwrap();
        let t0 = mesh.pop().unwrap();
        let tag_a = tag(PayloadKind::WaterHeight, 0.0);
        let tag_b = tag(PayloadKind::MomentumX, 0.0);

        // Rank 0 sends b then a; rank 1 receives a then b.
        let handle = thread::spawn(move || {
            let got = t1
                .exchange(
                    Vec::new(),
                    &[
                        InboundEdge {
                            from: 0,
                            tag: tag_a,
                            len: 1,
                        },
                        InboundEdge {
                            from: 0,
                            tag: tag_b,
                            len: 1,
                        },
                    ],
                )
                .unwrap();
            assert_eq!(got[0], vec![10.0]);
            assert_eq!(got[1], vec![20.0]);
        });

        t0.exchange(
            vec![
                OutboundEdge {
                    to: 1,
                    tag: tag_b,
                    payload: vec![20.0],
                },
                OutboundEdge {
                    to: 1,
                    tag: tag_a,
                    payload: vec![10.0],
                },
            ],
            &[],
        )
        .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn fifo_preserved_per_sender_and_tag() {
        let mut mesh = ChannelTransport::mesh(2);
        let t1 = mesh.pop().unwrap();
        let t0 = mesh.pop().unwrap();
        let tg = tag(PayloadKind::Timestep, 0.0);

        let handle = thread::spawn(move || {
            let got = t1
                .exchange(
                    Vec::new(),
                    &[
                        InboundEdge {
                            from: 0,
                            tag: tg,
                            len: 1,
                        },
                        InboundEdge {
                            from: 0,
                            tag: tg,
                            len: 1,
                        },
                    ],
                )
                .unwrap();
            assert_eq!(got[0], vec![1.0], "first sent must arrive first");
            assert_eq!(got[1], vec![2.0]);
        });

        t0.exchange(
            vec![
                OutboundEdge {
                    to: 1,
                    tag: tg,
                    payload: vec![1.0],
                },
                OutboundEdge {
                    to: 1,
                    tag: tg,
                    payload: vec![2.0],
                },
            ],
            &[],
        )
        .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn reduce_min_agrees_on_all_ranks() {
        let mesh = ChannelTransport::mesh(3);
        let handles: Vec<_> = mesh
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                thread::spawn(move || {
                    let local = [0.5, 0.125, 0.25][i];
                    // Two consecutive rounds must both work.
                    let first = t.all_reduce_min(local).unwrap();
                    let second = t.all_reduce_min(local * 2.0).unwrap();
                    (first, second)
                })
            })
            .collect();
        for h in handles {
            let (first, second) = h.join().unwrap();
            assert_eq!(first, 0.125);
            assert_eq!(second, 0.25);
        }
    }

    #[test]
    fn wrong_length_is_a_payload_error() {
        let mut mesh = ChannelTransport::mesh(2);
        let t1 = mesh.pop().unwrap();
        let t0 = mesh.pop().unwrap();
        let tg = tag(PayloadKind::WaterHeight, 0.0);

        t0.exchange(
            vec![OutboundEdge {
                to: 1,
                tag: tg,
                payload: vec![1.0, 2.0, 3.0],
            }],
            &[],
        )
        .unwrap();

        let err = t1
            .exchange(
                Vec::new(),
                &[InboundEdge {
                    from: 0,
                    tag: tg,
                    len: 2,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, CommError::PayloadLength { got: 3, .. }));
    }
}
