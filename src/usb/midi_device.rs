//! USB MIDI device.
//!
//! Initialises the Embassy USB stack on the nRF52840 hardware USB peripheral
//! and exposes one class-compliant MIDI interface (no driver needed on any
//! host OS). Outbound messages arrive on a channel from the dispatch loop and
//! go out as 4-byte USB-MIDI event packets.

use crate::config;
use crate::midi::MidiMessage;
use defmt::{info, warn};
use embassy_nrf::usb::vbus_detect::SoftwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{self, bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_usb::class::midi::MidiClass;
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
});

/// VBUS state is reported by the SoftDevice (it owns the POWER peripheral),
/// so the driver uses the software detector fed from SoC events.
pub type UsbDriver = Driver<'static, peripherals::USBD, &'static SoftwareVbusDetect>;

static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 128]> = StaticCell::new();

/// Build result containing the USB device runner and the MIDI endpoint.
pub struct UsbMidiDevice {
    pub device: UsbDevice<'static, UsbDriver>,
    pub midi: MidiClass<'static, UsbDriver>,
}

/// Initialise the USB stack and create the MIDI device.
///
/// Must be called exactly once.  All static buffers are consumed here.
pub fn init(usbd: peripherals::USBD, vbus: &'static SoftwareVbusDetect) -> UsbMidiDevice {
    let driver = Driver::new(usbd, Irqs, vbus);

    // USB device-level configuration.
    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;

    // Allocate static descriptor buffers.
    let config_desc = USB_CONFIG_DESC.init([0u8; 256]);
    let bos_desc = USB_BOS_DESC.init([0u8; 256]);
    let msos_desc = USB_MSOS_DESC.init([0u8; 256]);
    let ctrl_buf = USB_CTRL_BUF.init([0u8; 128]);

    let mut builder = Builder::new(
        driver,
        usb_config,
        config_desc,
        bos_desc,
        msos_desc,
        ctrl_buf,
    );

    // One virtual cable in each direction, 64-byte bulk endpoints.
    let midi = MidiClass::new(&mut builder, 1, 1, 64);

    let device = builder.build();

    info!("USB MIDI device initialised");

    UsbMidiDevice { device, midi }
}

/// Run the USB device stack - must be spawned as a dedicated Embassy task.
///
/// This handles USB enumeration, suspend/resume, and endpoint servicing.
pub async fn run_usb_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    info!("USB device task started");
    device.run().await
}

/// MIDI forwarding task - drains the dispatch loop's outbound channel and
/// writes each message as one USB-MIDI event packet.
pub async fn midi_writer_task(
    mut midi: MidiClass<'static, UsbDriver>,
    midi_rx: &Receiver<'static, CriticalSectionRawMutex, MidiMessage, 16>,
) -> ! {
    info!("MIDI writer task started - waiting for messages");

    loop {
        let message = midi_rx.receive().await;
        let packet = message.to_usb_packet();
        if let Err(_e) = midi.write_packet(&packet).await {
            warn!("USB MIDI write failed");
        }
    }
}
