use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::state::storage::KeyValueStore;

pub const DEVICE_ID_KEY: &str = "device-id";

/// Returns the identifier the cloud store is partitioned by, generating and storing it on first
/// use.
pub fn device_identity(storage: &dyn KeyValueStore) -> Result<Arc<str>> {
    if let Some(existing) = storage.get(DEVICE_ID_KEY)? {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.into());
        }
    }

    let generated = Uuid::new_v4().to_string();
    storage.set(DEVICE_ID_KEY, &generated)?;
    info!("Generated device identity {generated}");
    Ok(generated.into())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::state::storage::memory::MemoryStore;

    use super::{device_identity, DEVICE_ID_KEY};

    #[test]
    fn test_identity_is_stable() -> Result<()> {
        let storage = MemoryStore::default();
        let first = device_identity(&storage)?;
        let second = device_identity(&storage)?;
        assert_eq!(first, second);
        assert_eq!(storage.value(DEVICE_ID_KEY).as_deref(), Some(&*first));
        Ok(())
    }

    #[test]
    fn test_identity_fails_when_it_cannot_be_stored() {
        let storage = MemoryStore {
            failing: true,
            ..Default::default()
        };
        assert!(device_identity(&storage).is_err());
    }
}
