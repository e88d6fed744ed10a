//! Flash persistence for the bank configuration.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` map API.
//! Writes are write-through: every accepted configuration change is persisted
//! immediately, so a power cycle at any point loses at most the change in
//! flight.
//!
//! Storage layout (u16 map keys):
//!   - `0xA0xx` schema marker, version baked into the key so a firmware with
//!     a different record layout starts from factory defaults instead of
//!     misreading old records;
//!   - `0xB000` active bank;
//!   - `0xC0bi` one 6-byte button record per (bank `b`, index `i`) slot.

use crate::config::{
    NUM_BANKS, NUM_BUTTONS, SCHEMA_VERSION, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START,
};
use crate::error::Error;
use crate::store::{ButtonConfig, ConfigStore};
use defmt::{debug, error, info, warn};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Marker proving the region was initialised with the current record layout.
const KEY_SCHEMA_INIT: u16 = 0xA000 | SCHEMA_VERSION as u16;

/// Active bank at last change.
const KEY_CURRENT_BANK: u16 = 0xB000;

/// Working buffer for map operations; records are tiny.
const BUF_SIZE: usize = 64;

fn slot_key(bank: usize, index: usize) -> u16 {
    0xC000 | ((bank as u16) << 4) | index as u16
}

async fn read_record(flash: &mut impl NorFlash, key: u16) -> Option<ButtonConfig> {
    let mut buf = [0u8; BUF_SIZE];
    match fetch_item::<u16, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut NoCache::new(),
        &mut buf,
        &key,
    )
    .await
    {
        Ok(Some(data)) => ButtonConfig::decode(data),
        Ok(None) => None,
        Err(e) => {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
            None
        }
    }
}

async fn write_bytes(flash: &mut impl NorFlash, key: u16, data: &[u8]) -> Result<(), Error> {
    let mut buf = [0u8; BUF_SIZE];
    store_item::<u16, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut NoCache::new(),
        &mut buf,
        &key,
        &data,
    )
    .await
    .map_err(|e| {
        error!("Flash write error: {:?}", defmt::Debug2Format(&e));
        Error::Storage
    })
}

/// Load the configuration from flash, falling back to factory defaults.
///
/// A missing schema marker (first boot, or a layout change) writes the full
/// default table and the marker. With the marker present, each slot is read
/// individually and a slot that is missing or fails to decode falls back to
/// its own factory default without disturbing the others.
pub async fn load_or_initialize(flash: &mut impl NorFlash) -> ConfigStore {
    let mut buf = [0u8; BUF_SIZE];
    let initialized = match fetch_item::<u16, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut NoCache::new(),
        &mut buf,
        &KEY_SCHEMA_INIT,
    )
    .await
    {
        Ok(Some(_)) => true,
        Ok(None) => false,
        Err(e) => {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
            false
        }
    };

    let mut store = ConfigStore::with_defaults();

    if !initialized {
        info!("Storage not initialised, writing factory defaults");
        // Defaults are already live in RAM; a write failure here only costs
        // persistence, so it is logged and ignored.
        if save_all(flash, &store).await.is_ok() {
            let _ = write_bytes(flash, KEY_SCHEMA_INIT, &[1]).await;
        }
        return store;
    }

    for bank in 0..NUM_BANKS {
        for index in 0..NUM_BUTTONS {
            match read_record(flash, slot_key(bank, index)).await {
                Some(config) => {
                    store.set(bank, index, config);
                }
                None => {
                    warn!("Slot {}/{} unreadable, using default", bank, index);
                }
            }
        }
    }

    let mut buf = [0u8; BUF_SIZE];
    match fetch_item::<u16, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut NoCache::new(),
        &mut buf,
        &KEY_CURRENT_BANK,
    )
    .await
    {
        Ok(Some(data)) if !data.is_empty() => {
            // Out-of-range stored banks are ignored by the store.
            store.set_current_bank(data[0]);
        }
        Ok(_) => {}
        Err(e) => {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
        }
    }

    info!("Configuration loaded, bank {}", store.current_bank());
    store
}

/// Persist one button record.
pub async fn save_button(
    flash: &mut impl NorFlash,
    bank: usize,
    index: usize,
    config: &ButtonConfig,
) -> Result<(), Error> {
    let mut record = [0u8; ButtonConfig::ENCODED_LEN];
    if config.encode(&mut record) == 0 {
        return Err(Error::BufferOverflow);
    }
    write_bytes(flash, slot_key(bank, index), &record).await?;
    debug!("Saved button {}/{}", bank, index);
    Ok(())
}

/// Persist the active bank pointer.
pub async fn save_current_bank(flash: &mut impl NorFlash, bank: u8) -> Result<(), Error> {
    write_bytes(flash, KEY_CURRENT_BANK, &[bank]).await?;
    debug!("Saved current bank {}", bank);
    Ok(())
}

/// Persist the entire table, used when initialising a blank region.
pub async fn save_all(flash: &mut impl NorFlash, store: &ConfigStore) -> Result<(), Error> {
    for bank in 0..NUM_BANKS {
        for index in 0..NUM_BUTTONS {
            let config = store.get(bank, index);
            save_button(flash, bank, index, &config).await?;
        }
    }
    save_current_bank(flash, store.current_bank()).await?;
    info!("Saved full configuration table");
    Ok(())
}
