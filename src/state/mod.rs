//! Local side of the tracker.
//!  - [entities] holds the persisted aggregate: logs, categories and settings.
//!  - [store::StateStore] owns the aggregate and writes it to [storage] after every mutation.
//!  - [preferences] keeps the reminder flags that live under their own storage keys.

pub mod entities;
pub mod preferences;
pub mod settings;
pub mod storage;
pub mod store;
