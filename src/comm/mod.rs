//! Communication transports for cross-rank ghost exchange.
//!
//! The solver never talks to a message-passing library directly; it builds
//! lists of outbound and inbound edge payloads and hands them to a
//! [`Transport`]. A transport posts all sends fire-and-forget, posts all
//! receives, and blocks until every receive has completed: the deferred
//! barrier the exchange protocol is built on. The only other collective is
//! the min-reduction used by global timestepping.
//!
//! Three implementations:
//!
//! - [`NullTransport`]: single rank, no neighbours.
//! - [`channel::ChannelTransport`]: in-process ranks on threads, used by
//!   the test suite to exercise the full cross-rank protocol.
//! - `MpiTransport`: real MPI via the `mpi` crate, behind the `mpi`
//!   feature.

pub mod channel;
#[cfg(feature = "mpi")]
pub mod mpi;

use thiserror::Error;

/// Identifier of a participating process.
pub type Rank = usize;

/// Error from the communication layer.
///
/// Transport faults are fatal to the iteration: the driver reports and
/// aborts, there are no retries and no application-level timeouts.
#[derive(Debug, Error)]
pub enum CommError {
    /// The underlying transport failed.
    #[error("transport fault on rank {rank}: {detail}")]
    Transport {
        /// Rank observing the fault.
        rank: Rank,
        /// Transport-specific diagnostic.
        detail: String,
    },
    /// A payload arrived with an unexpected length.
    #[error("rank {rank}: payload for tag {tag:?} has length {got}, expected {expected}")]
    PayloadLength {
        /// Receiving rank.
        rank: Rank,
        /// Tag of the offending message.
        tag: MessageTag,
        /// Received length.
        got: usize,
        /// Expected length.
        expected: usize,
    },
    /// An exchange was requested on a transport without peers.
    #[error("rank {rank}: no route to rank {to}")]
    NoRoute {
        /// Sending rank.
        rank: Rank,
        /// Unreachable peer.
        to: Rank,
    },
}

/// What a ghost-exchange message carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PayloadKind {
    /// The sender's cumulative local timestep (one value).
    Timestep = 0,
    /// Water height edge strip.
    WaterHeight = 1,
    /// x-momentum edge strip.
    MomentumX = 2,
    /// y-momentum edge strip.
    MomentumY = 3,
    /// Bathymetry edge strip (startup only).
    Bathymetry = 4,
}

/// Which edge of the *receiving* block a message is destined for.
///
/// Mirrors [`crate::types::Side`] but carries its own compact encoding for
/// the tag bit-field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EdgeSlot {
    /// Receiver's left ghost column.
    Left = 0,
    /// Receiver's right ghost column.
    Right = 1,
    /// Receiver's bottom ghost row.
    Bottom = 2,
    /// Receiver's top ghost row.
    Top = 3,
}

/// Message tag uniquely identifying the (edge, kind, origin) triple.
///
/// Layout: bits 26.. carry the payload kind, bits 24..26 the receiving edge,
/// and the low 24 bits the originating block's physical coordinate (rounded;
/// the y origin for vertical edges, the x origin for horizontal ones). The
/// fields are disjoint and combined with OR, so two sibling blocks at the
/// same rank pair but different physical locations can never alias, unlike
/// masking the coordinate *into* the kind bits, which collapses distinct
/// origins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageTag(u32);

impl MessageTag {
    const ORIGIN_BITS: u32 = 24;
    const ORIGIN_MASK: u32 = (1 << Self::ORIGIN_BITS) - 1;

    /// Build a tag. `origin` is the relevant physical origin coordinate of
    /// the sending block; only its low 24 bits are kept.
    pub fn new(kind: PayloadKind, edge: EdgeSlot, origin: f64) -> Self {
        let coord = (origin.round() as i64 as u32) & Self::ORIGIN_MASK;
        MessageTag((kind as u32) << 26 | (edge as u32) << Self::ORIGIN_BITS | coord)
    }

    /// Payload kind field.
    pub fn kind(self) -> PayloadKind {
        match self.0 >> 26 {
            0 => PayloadKind::Timestep,
            1 => PayloadKind::WaterHeight,
            2 => PayloadKind::MomentumX,
            3 => PayloadKind::MomentumY,
            _ => PayloadKind::Bathymetry,
        }
    }

    /// Receiving-edge field.
    pub fn edge(self) -> EdgeSlot {
        match (self.0 >> Self::ORIGIN_BITS) & 0b11 {
            0 => EdgeSlot::Left,
            1 => EdgeSlot::Right,
            2 => EdgeSlot::Bottom,
            _ => EdgeSlot::Top,
        }
    }

    /// Low 24 bits of the origin coordinate.
    pub fn origin_bits(self) -> u32 {
        self.0 & Self::ORIGIN_MASK
    }

    /// Raw value, e.g. for an MPI tag.
    pub fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

/// One outbound edge payload.
#[derive(Clone, Debug)]
pub struct OutboundEdge {
    /// Destination rank.
    pub to: Rank,
    /// Message tag.
    pub tag: MessageTag,
    /// Gathered edge data (columns are contiguous, rows pre-gathered).
    pub payload: Vec<f64>,
}

/// One expected inbound edge payload.
#[derive(Clone, Copy, Debug)]
pub struct InboundEdge {
    /// Source rank.
    pub from: Rank,
    /// Expected tag.
    pub tag: MessageTag,
    /// Expected element count.
    pub len: usize,
}

/// Message-passing backend.
///
/// Per (sender, receiver, tag) the transport must preserve FIFO order.
/// `exchange` returns the received payloads in the order of `recvs`.
pub trait Transport: Send {
    /// This process's rank.
    fn rank(&self) -> Rank;

    /// Total participating ranks.
    fn num_ranks(&self) -> usize;

    /// Fire all sends, post all receives, wait for the receives.
    ///
    /// Sends are fire-and-forget: the transport may reclaim their resources
    /// any time after the call returns. There is no cancellation; the first
    /// transport failure aborts the exchange.
    fn exchange(
        &self,
        sends: Vec<OutboundEdge>,
        recvs: &[InboundEdge],
    ) -> Result<Vec<Vec<f64>>, CommError>;

    /// Minimum of `local` across all ranks.
    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError>;
}

/// Transport for a lone rank: nothing to exchange, reductions are identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn rank(&self) -> Rank {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn exchange(
        &self,
        sends: Vec<OutboundEdge>,
        recvs: &[InboundEdge],
    ) -> Result<Vec<Vec<f64>>, CommError> {
        if let Some(s) = sends.first() {
            return Err(CommError::NoRoute { rank: 0, to: s.to });
        }
        if let Some(r) = recvs.first() {
            return Err(CommError::NoRoute { rank: 0, to: r.from });
        }
        Ok(Vec::new())
    }

    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError> {
        Ok(local)
    }
}
