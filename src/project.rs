//! Project number: the value that names this bridge.
//!
//! The project number is persisted across power cycles, shown in the
//! advertised device name, and echoed in the keep-warm text. A change
//! takes effect on the next advertisement; the current connection keeps
//! the name it was advertised with.

use core::cell::RefCell;

use crate::config::{DEFAULT_PROJECT, PROJECT_MAX_LEN};
use crate::error::{ChannelError, StoreError};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::String;

/// A validated, non-empty project number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectId(String<PROJECT_MAX_LEN>);

impl ProjectId {
    /// Validate a peer write: UTF-8, surrounding whitespace trimmed,
    /// non-empty, and at most [`PROJECT_MAX_LEN`] bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, ChannelError> {
        let text = core::str::from_utf8(raw).map_err(|_| ChannelError::NotText)?;
        Self::from_text(text)
    }

    fn from_text(text: &str) -> Result<Self, ChannelError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChannelError::Empty);
        }
        let mut s = String::new();
        s.push_str(text).map_err(|_| ChannelError::Oversized)?;
        Ok(Self(s))
    }

    /// The value used before anything has been persisted.
    pub fn default_id() -> Self {
        let mut s = String::new();
        // DEFAULT_PROJECT is shorter than PROJECT_MAX_LEN.
        let _ = s.push_str(DEFAULT_PROJECT);
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::default_id()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProjectId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// In-memory copy of the project number shared between tasks.
///
/// The project configurator is the only writer after boot.
pub struct ProjectCell {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Option<ProjectId>>>,
}

impl ProjectCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn get(&self) -> ProjectId {
        self.inner
            .lock(|p| p.borrow().clone())
            .unwrap_or_default()
    }

    pub fn set(&self, id: ProjectId) {
        self.inner.lock(|p| *p.borrow_mut() = Some(id));
    }
}

impl Default for ProjectCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-volatile home of the project number.
#[allow(async_fn_in_trait)]
pub trait ProjectStore {
    /// `Ok(None)` when nothing has been written yet.
    async fn load(&mut self) -> Result<Option<ProjectId>, StoreError>;

    async fn save(&mut self, id: &ProjectId) -> Result<(), StoreError>;
}

/// Read the persisted project number, writing the default if there is
/// none or it cannot be read.
pub async fn load_or_init<S: ProjectStore>(store: &mut S) -> ProjectId {
    match store.load().await {
        Ok(Some(id)) => {
            info!("project number: {}", id.as_str());
            return id;
        }
        Ok(None) => info!("no stored project number, using default"),
        Err(e) => warn!("project number unreadable ({:?}), using default", e),
    }

    let id = ProjectId::default_id();
    if let Err(e) = store.save(&id).await {
        error!("failed to store default project number: {:?}", e);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use embassy_futures::block_on;

    #[test]
    fn parse_trims_whitespace() {
        let id = ProjectId::parse(b"  230404\r\n").unwrap();
        assert_eq!(id.as_str(), "230404");
    }

    #[test]
    fn parse_rejects_empty_and_blank() {
        assert_eq!(ProjectId::parse(b""), Err(ChannelError::Empty));
        assert_eq!(ProjectId::parse(b" \t "), Err(ChannelError::Empty));
    }

    #[test]
    fn parse_rejects_non_utf8() {
        assert_eq!(ProjectId::parse(&[0xC3, 0x28]), Err(ChannelError::NotText));
    }

    #[test]
    fn parse_rejects_too_long() {
        let raw = [b'9'; PROJECT_MAX_LEN + 1];
        assert_eq!(ProjectId::parse(&raw), Err(ChannelError::Oversized));
        assert!(ProjectId::parse(&raw[..PROJECT_MAX_LEN]).is_ok());
    }

    #[test]
    fn cell_defaults_until_set() {
        let cell = ProjectCell::new();
        assert_eq!(cell.get().as_str(), DEFAULT_PROJECT);
        cell.set(ProjectId::parse(b"42").unwrap());
        assert_eq!(cell.get().as_str(), "42");
    }

    #[test]
    fn load_or_init_uses_stored_value() {
        let mut store = MemoryStore::with_value("230404");
        let id = block_on(load_or_init(&mut store));
        assert_eq!(id.as_str(), "230404");
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn load_or_init_writes_default_when_empty() {
        let mut store = MemoryStore::new();
        let id = block_on(load_or_init(&mut store));
        assert_eq!(id.as_str(), DEFAULT_PROJECT);
        assert_eq!(store.value().as_deref(), Some(DEFAULT_PROJECT));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn load_or_init_recovers_from_read_error() {
        let mut store = MemoryStore::new();
        store.fail_loads(true);
        let id = block_on(load_or_init(&mut store));
        assert_eq!(id.as_str(), DEFAULT_PROJECT);
        assert_eq!(store.writes(), 1);
    }
}
