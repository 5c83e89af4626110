//! MPI transport for distributed runs.
//!
//! Requires the `mpi` feature and an MPI installation. The caller owns the
//! universe:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let transport = MpiTransport::new(universe.world());
//! ```
//!
//! `exchange` maps directly onto the non-blocking primitives: every send is
//! posted immediately and only reclaimed after the receives complete (the
//! deferred-barrier pattern), every receive is posted up front and waited on
//! as a batch. Tags carry the packed (edge, kind, origin) triple.

use mpi::collective::SystemOperation;
use mpi::point_to_point::{Destination, Source};
use mpi::topology::{Communicator, SimpleCommunicator};

use super::{CommError, InboundEdge, OutboundEdge, Rank, Transport};

/// Transport backed by an MPI communicator.
pub struct MpiTransport {
    world: SimpleCommunicator,
}

impl MpiTransport {
    /// Wrap a communicator. MPI must already be initialized.
    pub fn new(world: SimpleCommunicator) -> Self {
        Self { world }
    }
}

impl Transport for MpiTransport {
    fn rank(&self) -> Rank {
        self.world.rank() as Rank
    }

    fn num_ranks(&self) -> usize {
        self.world.size() as usize
    }

    fn exchange(
        &self,
        sends: Vec<OutboundEdge>,
        recvs: &[InboundEdge],
    ) -> Result<Vec<Vec<f64>>, CommError> {
        let mut buffers: Vec<Vec<f64>> = recvs.iter().map(|r| vec![0.0; r.len]).collect();

        mpi::request::scope(|scope| {
            // Sends are fire-and-forget; the guards release them once the
            // receive batch below has completed and the scope unwinds.
            let _send_guards: Vec<_> = sends
                .iter()
                .map(|s| {
                    mpi::request::WaitGuard::from(
                        self.world
                            .process_at_rank(s.to as i32)
                            .immediate_send_with_tag(scope, &s.payload[..], s.tag.as_i32()),
                    )
                })
                .collect();

            let recv_requests: Vec<_> = recvs
                .iter()
                .zip(buffers.iter_mut())
                .map(|(r, buf)| {
                    self.world
                        .process_at_rank(r.from as i32)
                        .immediate_receive_into_with_tag(scope, &mut buf[..], r.tag.as_i32())
                })
                .collect();

            for request in recv_requests {
                request.wait();
            }
        });

        Ok(buffers)
    }

    fn all_reduce_min(&self, local: f64) -> Result<f64, CommError> {
        let mut global = f64::INFINITY;
        self.world
            .all_reduce_into(&local, &mut global, SystemOperation::min());
        Ok(global)
    }
}
