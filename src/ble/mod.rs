//! Bluetooth Low Energy subsystem.
//!
//! Drives the Nordic SoftDevice S140 in **Peripheral** role: the device
//! advertises a single custom configuration service and accepts one central
//! at a time. The GATT server (`config_service`) receives raw command writes
//! and hands them to the dispatch loop over a channel; the loop pushes fresh
//! active-bank snapshots back for the notify characteristic.
//!
//! The radio can be switched off from the settings menu: `set_enabled(false)`
//! aborts advertising or drops the live connection, `set_enabled(true)`
//! resumes advertising.

pub mod config_service;

use crate::config::BLE_DEVICE_NAME;
use crate::remote::SNAPSHOT_LEN;
use config_service::{ConfigServer, ConfigServerEvent, ConfigServiceEvent};
use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::{raw, Softdevice};

/// Raw command frames written by the remote client, oldest first.
pub static COMMANDS: Channel<CriticalSectionRawMutex, heapless::Vec<u8, 16>, 4> = Channel::new();

/// Latest active-bank snapshot to publish. Overwritten, never queued: only
/// the newest state matters to a client.
pub static SNAPSHOT: Signal<CriticalSectionRawMutex, [u8; SNAPSHOT_LEN]> = Signal::new();

/// Radio on/off requests from the settings menu.
static ENABLED: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Request the radio on or off. Idempotent.
pub fn set_enabled(enabled: bool) {
    ENABLED.signal(enabled);
}

/// SoftDevice configuration: one peripheral link, no central role, MTU large
/// enough for the whole snapshot in a single notification.
pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: BLE_DEVICE_NAME.as_ptr() as _,
            current_len: BLE_DEVICE_NAME.len() as u16,
            max_len: BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

// Flags + the 128-bit service UUID (little endian) in the advertisement,
// the device name in the scan response.
#[rustfmt::skip]
static ADV_DATA: &[u8] = &[
    0x02, raw::BLE_GAP_AD_TYPE_FLAGS as u8,
    raw::BLE_GAP_ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE as u8,
    0x11, raw::BLE_GAP_AD_TYPE_128BIT_SERVICE_UUID_COMPLETE as u8,
    0x4b, 0x91, 0x31, 0xc3, 0xc9, 0xc5, 0xcc, 0x8f,
    0x9e, 0x45, 0xb5, 0x1f, 0x01, 0xc2, 0xaf, 0x4f,
];

// AD structure length byte + type byte + the name itself. Built from
// BLE_DEVICE_NAME so a name edit cannot desynchronize the scan response.
const SCAN_DATA_LEN: usize = 2 + BLE_DEVICE_NAME.len();
static SCAN_DATA: [u8; SCAN_DATA_LEN] = scan_response();

// The whole scan response is a single AD structure and must fit the
// 31-byte legacy advertising PDU payload.
const _: () = assert!(SCAN_DATA_LEN <= 31);

const fn scan_response() -> [u8; SCAN_DATA_LEN] {
    let name = BLE_DEVICE_NAME.as_bytes();
    let mut data = [0u8; SCAN_DATA_LEN];
    data[0] = (name.len() + 1) as u8;
    data[1] = raw::BLE_GAP_AD_TYPE_COMPLETE_LOCAL_NAME as u8;
    let mut i = 0;
    while i < name.len() {
        data[2 + i] = name[i];
        i += 1;
    }
    data
}

/// Advertising + connection loop.
///
/// Runs forever: advertise, serve one connection, repeat on disconnect. The
/// enable signal aborts whichever phase is active.
#[embassy_executor::task]
pub async fn ble_task(sd: &'static Softdevice, server: &'static ConfigServer) -> ! {
    let mut enabled = true;
    loop {
        if !enabled {
            enabled = ENABLED.wait().await;
            continue;
        }

        let config = peripheral::Config::default();
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: ADV_DATA,
            scan_data: &SCAN_DATA,
        };

        info!("BLE advertising as {}", BLE_DEVICE_NAME);
        let conn = match select(
            peripheral::advertise_connectable(sd, adv, &config),
            ENABLED.wait(),
        )
        .await
        {
            Either::First(Ok(conn)) => conn,
            Either::First(Err(e)) => {
                warn!("BLE advertise error: {:?}", e);
                continue;
            }
            Either::Second(want) => {
                enabled = want;
                continue;
            }
        };

        info!("BLE client connected");

        let gatt = gatt_server::run(&conn, server, |event| match event {
            ConfigServerEvent::Config(ConfigServiceEvent::CommandWrite(frame)) => {
                // Parsing and validation happen in the dispatch loop; a full
                // queue just drops the frame, same as a malformed one.
                if COMMANDS.try_send(frame).is_err() {
                    warn!("BLE command queue full, dropping frame");
                }
            }
            ConfigServerEvent::Config(ConfigServiceEvent::SnapshotCccdWrite { notifications }) => {
                info!("Snapshot notifications: {}", notifications);
            }
        });

        let snapshots = async {
            loop {
                let snapshot = SNAPSHOT.wait().await;
                if let Err(e) = server.config.snapshot_set(&snapshot) {
                    warn!("snapshot value update failed: {:?}", e);
                }
                // Notify fails when the client has notifications off; the
                // readable value above is still current.
                let _ = server.config.snapshot_notify(&conn, &snapshot);
            }
        };

        match select(select(gatt, snapshots), ENABLED.wait()).await {
            Either::First(_) => {
                info!("BLE client disconnected");
            }
            Either::Second(want) => {
                enabled = want;
                // Dropping the connection handle here closes the link.
            }
        }
    }
}
