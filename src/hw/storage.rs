//! Persistent storage for the project number.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` crate.
//!
//! Storage layout:
//!   - One key/value item, key `KEY_PROJECT`, value = the project number's
//!     UTF-8 bytes. Each save appends a new copy; `sequential-storage`
//!     handles wear levelling and GC.

use ble2lora::config::{PROJECT_MAX_LEN, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use ble2lora::project::{ProjectId, ProjectStore};
use ble2lora::StoreError;
use defmt::{debug, error};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key for the project number in the map storage.
const KEY_PROJECT: u8 = 0x01;

/// Scratch space for one item plus sequential-storage's header.
const BUF_SIZE: usize = 64;

const _: () = assert!(PROJECT_MAX_LEN + 16 <= BUF_SIZE);

pub struct FlashProjectStore<F> {
    flash: F,
}

impl<F: NorFlash> FlashProjectStore<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }
}

impl<F: NorFlash> ProjectStore for FlashProjectStore<F> {
    async fn load(&mut self) -> Result<Option<ProjectId>, StoreError> {
        let mut buf = [0u8; BUF_SIZE];

        match fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_PROJECT,
        )
        .await
        {
            Ok(Some(data)) => ProjectId::parse(data).map(Some).map_err(|e| {
                error!("stored project number invalid: {:?}", e);
                StoreError::Corrupt
            }),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Flash read error: {:?}", defmt::Debug2Format(&e));
                Err(StoreError::Flash)
            }
        }
    }

    async fn save(&mut self, id: &ProjectId) -> Result<(), StoreError> {
        let mut buf = [0u8; BUF_SIZE];
        let item = id.as_bytes();

        match store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_PROJECT,
            &item,
        )
        .await
        {
            Ok(()) => {
                debug!("project number written to flash");
                Ok(())
            }
            Err(e) => {
                error!("Flash write error: {:?}", defmt::Debug2Format(&e));
                Err(StoreError::Flash)
            }
        }
    }
}
