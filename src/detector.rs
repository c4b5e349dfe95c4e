use tracing::debug;

use crate::error::StoreError;
use crate::store::StateStore;

/// True iff `observed` is a real reading that differs from `previous`.
pub fn should_notify(observed: &str, previous: Option<&str>) -> bool {
    !observed.is_empty() && previous != Some(observed)
}

/// Owns the last-seen marker: read once at construction, then kept in memory
/// and written through to the store on every commit.
pub struct ChangeDetector<S> {
    store: S,
    last: Option<String>,
}

impl<S: StateStore> ChangeDetector<S> {
    pub fn open(store: S) -> Result<Self, StoreError> {
        let last = store.load()?;
        debug!(last = ?last, "Loaded last-seen marker");
        Ok(Self { store, last })
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn should_notify(&self, observed: &str) -> bool {
        should_notify(observed, self.last())
    }

    /// Overwrite the marker. The in-memory value moves even if the write
    /// fails, so one bad disk write does not re-trigger this process.
    pub fn commit(&mut self, marker: &str) -> Result<(), StoreError> {
        self.last = Some(marker.to_string());
        self.store.save(marker)
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}
