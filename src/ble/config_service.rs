//! GATT server definition for the remote configuration service.
//!
//! One service, two characteristics:
//!   - command: write-only, raw command frames (see `remote`);
//!   - snapshot: read + notify, the active-bank snapshot (`SNAPSHOT_LEN`
//!     bytes, one byte of bank index plus the four button records).
//!
//! UUIDs are fixed so existing client apps keep working across firmware
//! versions.

#[nrf_softdevice::gatt_service(uuid = "4fafc201-1fb5-459e-8fcc-c5c9c331914b")]
pub struct ConfigService {
    /// Raw command frames from the client.
    #[characteristic(uuid = "beb5483e-36e1-4688-b7f5-ea07361b26a8", write)]
    pub command: heapless::Vec<u8, 16>,

    /// Active-bank snapshot, refreshed after every accepted change.
    #[characteristic(uuid = "beb5483e-36e1-4688-b7f5-ea07361b26a9", read, notify)]
    pub snapshot: [u8; crate::remote::SNAPSHOT_LEN],
}

#[nrf_softdevice::gatt_server]
pub struct ConfigServer {
    pub config: ConfigService,
}
