//! Port allocation.
//!
//! A project gets a port on its first deploy and keeps it. Candidates are
//! drawn uniformly from the configured range and rejected if another record
//! already holds them; after [`MAX_ATTEMPTS`] rejections allocation fails.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skiff_core::{ProjectRecord, ProjectStore};

use crate::error::DeployError;

pub const MAX_ATTEMPTS: usize = 32;

pub struct PortAllocator {
    range: RangeInclusive<u16>,
    // Held across list + set_port so two projects cannot claim the same
    // candidate concurrently.
    rng: Mutex<StdRng>,
}

impl PortAllocator {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self::with_rng(range, StdRng::from_entropy())
    }

    /// Deterministic allocator for tests.
    pub fn seeded(range: RangeInclusive<u16>, seed: u64) -> Self {
        Self::with_rng(range, StdRng::seed_from_u64(seed))
    }

    fn with_rng(range: RangeInclusive<u16>, rng: StdRng) -> Self {
        Self {
            range,
            rng: Mutex::new(rng),
        }
    }

    pub fn range(&self) -> &RangeInclusive<u16> {
        &self.range
    }

    /// Return `record`'s port, assigning and persisting one if it has none.
    pub fn ensure_port(
        &self,
        store: &dyn ProjectStore,
        record: &ProjectRecord,
    ) -> Result<u16, DeployError> {
        if let Some(port) = record.port {
            return Ok(port);
        }

        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        let taken: HashSet<u16> = store
            .list()?
            .into_iter()
            .filter(|other| other.project_name != record.project_name)
            .filter_map(|other| other.port)
            .collect();

        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = rng.gen_range(self.range.clone());
            if taken.contains(&candidate) {
                tracing::debug!(project = %record.project_name, candidate, attempt, "port already assigned, redrawing");
                continue;
            }
            store.set_port(&record.project_name, candidate)?;
            tracing::info!(project = %record.project_name, port = candidate, "assigned port");
            return Ok(candidate);
        }

        Err(DeployError::AllocationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}
