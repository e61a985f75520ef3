//! Persistence port for plant records and the do-not-disturb flag.
//!
//! The in-memory registry is authoritative; a store only has to survive a
//! restart.  Save failures are returned, never retried here: the dispatch
//! loop owns the retry schedule.

use std::future::Future;

use anyhow::Result;
use irrigation_core::PlantRecord;

pub trait PlantStore: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Vec<PlantRecord>>> + Send;

    /// Replace every stored record with `records`.
    fn save(&self, records: &[PlantRecord]) -> impl Future<Output = Result<()>> + Send;

    fn load_dnd(&self) -> impl Future<Output = Result<bool>> + Send;

    fn save_dnd(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory store (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use super::*;
    use anyhow::bail;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Inner {
        records: Vec<PlantRecord>,
        dnd: bool,
        saves: usize,
        fail_saves: bool,
    }

    /// Shared handle; clones see the same data.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        inner: Arc<Mutex<Inner>>,
    }

    impl MemoryStore {
        pub fn records(&self) -> Vec<PlantRecord> {
            self.inner.lock().unwrap().records.clone()
        }

        pub fn dnd(&self) -> bool {
            self.inner.lock().unwrap().dnd
        }

        /// Successful saves so far.
        pub fn saves(&self) -> usize {
            self.inner.lock().unwrap().saves
        }

        pub fn set_failing(&self, fail: bool) {
            self.inner.lock().unwrap().fail_saves = fail;
        }
    }

    impl PlantStore for MemoryStore {
        async fn load(&self) -> Result<Vec<PlantRecord>> {
            Ok(self.records())
        }

        async fn save(&self, records: &[PlantRecord]) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_saves {
                bail!("disk full");
            }
            inner.records = records.to_vec();
            inner.saves += 1;
            Ok(())
        }

        async fn load_dnd(&self) -> Result<bool> {
            Ok(self.dnd())
        }

        async fn save_dnd(&self, enabled: bool) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_saves {
                bail!("disk full");
            }
            inner.dnd = enabled;
            Ok(())
        }
    }
}
