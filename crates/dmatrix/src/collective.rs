//! Collective communication between participants of a distributed dataset.
//!
//! The data layer needs two primitives: gathering per-column strings for
//! column-split data and reducing column counts. Transport is out of scope;
//! [`SingleProcess`] covers the non-distributed case and
//! [`InMemoryCommunicator`] connects threads of one process.

use std::io::Cursor;
use std::sync::{Arc, Barrier, Mutex};

use crate::error::{DataError, Result};
use crate::stream::{read_pod, read_strings, write_pod, write_strings};

/// Reduction applied by [`Communicator::allreduce_u64`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
}

/// A participant in a group of workers.
///
/// Every participant must issue the same sequence of collective calls.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Whether participants belong to different parties (vertical federated learning).
    fn is_federated(&self) -> bool {
        false
    }

    fn is_distributed(&self) -> bool {
        self.world_size() > 1
    }

    /// Gather one byte buffer from every participant, ordered by rank.
    fn allgather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Concatenate the string lists of all participants in rank order.
    fn allgather_strings(&self, local: &[String]) -> Result<Vec<String>> {
        let mut buf = Vec::new();
        write_strings(&mut buf, local)?;
        let mut out = Vec::new();
        for part in self.allgather_bytes(&buf)? {
            out.extend(read_strings(&mut Cursor::new(part), "gathered strings")?);
        }
        Ok(out)
    }

    /// Element-wise reduction of `values` across all participants, in place.
    fn allreduce_u64(&self, values: &mut [u64], op: ReduceOp) -> Result<()> {
        let mut buf = Vec::with_capacity(values.len() * 8);
        for &v in values.iter() {
            write_pod(&mut buf, v)?;
        }
        let parts = self.allgather_bytes(&buf)?;
        for (i, slot) in values.iter_mut().enumerate() {
            let mut acc = 0u64;
            for part in &parts {
                let mut cursor = Cursor::new(part.get(i * 8..i * 8 + 8).ok_or_else(|| {
                    DataError::Collective("allreduce buffers differ in length".into())
                })?);
                let v: u64 = read_pod(&mut cursor, "allreduce value")?;
                acc = match op {
                    ReduceOp::Sum => acc.checked_add(v).ok_or_else(|| {
                        DataError::Collective("allreduce sum overflowed".into())
                    })?,
                    ReduceOp::Max => acc.max(v),
                };
            }
            *slot = acc;
        }
        Ok(())
    }
}

/// The trivial group of one.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn allgather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(vec![local.to_vec()])
    }
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<u8>>>,
}

/// Connects the threads of one process, one communicator per thread.
#[derive(Debug, Clone)]
pub struct InMemoryCommunicator {
    rank: usize,
    world_size: usize,
    federated: bool,
    shared: Arc<Shared>,
}

impl InMemoryCommunicator {
    /// Create `world_size` connected communicators, indexed by rank.
    pub fn group(world_size: usize) -> Vec<Self> {
        let world_size = world_size.max(1);
        let shared = Arc::new(Shared {
            barrier: Barrier::new(world_size),
            slots: Mutex::new(vec![Vec::new(); world_size]),
        });
        (0..world_size)
            .map(|rank| Self {
                rank,
                world_size,
                federated: false,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Mark the group as federated.
    pub fn federated(mut self) -> Self {
        self.federated = true;
        self
    }
}

impl Communicator for InMemoryCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn is_federated(&self) -> bool {
        self.federated
    }

    fn allgather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        let poisoned = |_| DataError::Collective("a participant panicked".into());
        self.shared.slots.lock().map_err(poisoned)?[self.rank] = local.to_vec();
        self.shared.barrier.wait();
        let out = self.shared.slots.lock().map_err(poisoned)?.clone();
        // Nobody may overwrite a slot before every rank has read the round.
        self.shared.barrier.wait();
        Ok(out)
    }
}
