//! MIDI pedalboard firmware entry point (nRF52840 + SoftDevice S140).
//!
//! Task layout:
//!   - `ladder_task` samples the resistor-ladder ADC, debounces, and feeds
//!     button events into a channel;
//!   - the main loop owns the configuration store, dispatch engine, display
//!     and flash, and turns button events and remote commands into effects;
//!   - `midi_task` drains the outbound MIDI channel into the USB endpoint;
//!   - `ble_task` advertises the configuration service and queues client
//!     command writes;
//!   - `softdevice_task` runs the SoftDevice and forwards its USB power
//!     events to the VBUS detector.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_futures::select::{select3, Either3};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::usb::vbus_detect::SoftwareVbusDetect;
use embassy_nrf::{bind_interrupts, peripherals, saadc, twim};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker};
use embassy_usb::class::midi::MidiClass;
use embassy_usb::UsbDevice;
use nrf_softdevice::{Flash, SocEvent, Softdevice};
use static_cell::StaticCell;

use pedalboard::ble::{self, config_service::ConfigServer};
use pedalboard::config::{LADDER_POLL_MS, NUM_BUTTONS, STATUS_TICK_MS};
use pedalboard::dispatch::{Effect, Effects, Engine};
use pedalboard::input::{classify_level, ButtonEvent, LadderDebouncer};
use pedalboard::midi::MidiMessage;
use pedalboard::remote;
use pedalboard::storage;
use pedalboard::store::ConfigStore;
use pedalboard::ui::display as oled;
use pedalboard::ui::status::StatusBanner;
use pedalboard::usb::midi_device::{self, UsbDriver};

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

/// Debounced button events from the ladder task.
static BUTTON_EVENTS: Channel<CriticalSectionRawMutex, (u8, ButtonEvent), 8> = Channel::new();

/// Outbound MIDI messages for the USB writer task.
static MIDI_OUT: Channel<CriticalSectionRawMutex, MidiMessage, 16> = Channel::new();

static VBUS_DETECT: StaticCell<SoftwareVbusDetect> = StaticCell::new();
static CONFIG_SERVER: StaticCell<ConfigServer> = StaticCell::new();

type Oled = oled::Display<twim::Twim<'static, peripherals::TWISPI0>>;

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice, vbus: &'static SoftwareVbusDetect) -> ! {
    sd.run_with_callback(|event| match event {
        SocEvent::PowerUsbDetected => vbus.detected(true),
        SocEvent::PowerUsbRemoved => vbus.detected(false),
        SocEvent::PowerUsbPowerReady => vbus.ready(),
        _ => {}
    })
    .await
}

#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) -> ! {
    midi_device::run_usb_device(device).await
}

#[embassy_executor::task]
async fn midi_task(midi: MidiClass<'static, UsbDriver>) -> ! {
    let rx = MIDI_OUT.receiver();
    midi_device::midi_writer_task(midi, &rx).await
}

/// Sample the ladder pin, debounce, and publish semantic button events.
#[embassy_executor::task]
async fn ladder_task(mut adc: saadc::Saadc<'static, 1>) -> ! {
    let mut debouncer = LadderDebouncer::new();
    let mut ticker = Ticker::every(Duration::from_millis(LADDER_POLL_MS));
    loop {
        ticker.next().await;
        let mut buf = [0i16; 1];
        adc.sample(&mut buf).await;
        let sample = buf[0].max(0) as u16;
        let id = classify_level(sample);
        for event in debouncer.sample(id, Instant::now().as_millis()) {
            BUTTON_EVENTS.send(event).await;
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    interrupt::SAADC.set_priority(Priority::P3);
    interrupt::TWISPI0.set_priority(Priority::P3);
    interrupt::USBD.set_priority(Priority::P3);

    info!("pedalboard starting");

    // USB MIDI.
    let vbus = VBUS_DETECT.init(SoftwareVbusDetect::new(true, true));
    let usb = midi_device::init(p.USBD, vbus);
    unwrap!(spawner.spawn(usb_task(usb.device)));
    unwrap!(spawner.spawn(midi_task(usb.midi)));

    // SoftDevice + GATT server.
    let sd = Softdevice::enable(&ble::softdevice_config());
    let server = CONFIG_SERVER.init(unwrap!(ConfigServer::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd, vbus)));

    // Configuration, loaded before anything can produce MIDI.
    let mut flash = Flash::take(sd);
    let mut store = storage::load_or_initialize(&mut flash).await;
    let mut engine = Engine::new();
    let mut banner = StatusBanner::new();

    unwrap!(server.config.snapshot_set(&remote::encode_snapshot(&store)));
    unwrap!(spawner.spawn(ble::ble_task(sd, server)));

    // OLED over I2C.
    let twim_config = twim::Config::default();
    let i2c = twim::Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim_config);
    let mut display = oled::init(i2c);
    let lit = [false; NUM_BUTTONS];
    oled::draw_main(&mut display, &store, &lit);

    // Ladder ADC on AIN0.
    let mut adc_config = saadc::Config::default();
    adc_config.resolution = saadc::Resolution::_12BIT;
    let channel_config = saadc::ChannelConfig::single_ended(p.P0_02);
    let adc = saadc::Saadc::new(p.SAADC, Irqs, adc_config, [channel_config]);
    unwrap!(spawner.spawn(ladder_task(adc)));

    info!("pedalboard ready, bank {}", store.current_bank());

    let mut ble_enabled = engine.settings.ble_enabled;
    let mut brightness = engine.settings.brightness;
    let mut ticker = Ticker::every(Duration::from_millis(STATUS_TICK_MS));

    loop {
        match select3(
            BUTTON_EVENTS.receive(),
            ble::COMMANDS.receive(),
            ticker.next(),
        )
        .await
        {
            Either3::First((id, event)) => {
                let effects = engine.handle_event(id, event, &mut store);
                apply_effects(
                    effects,
                    &engine,
                    &store,
                    &mut flash,
                    &mut display,
                    &mut banner,
                )
                .await;
            }
            Either3::Second(frame) => {
                let Some(command) = remote::parse_command(&frame) else {
                    // Malformed frames are dropped without touching state.
                    continue;
                };
                let effects = match remote::apply_command(command, &mut store) {
                    remote::Applied::Button(index) => {
                        let bank = store.current_bank() as usize;
                        let config = store.get(bank, index);
                        if let Err(e) = storage::save_button(&mut flash, bank, index, &config).await
                        {
                            defmt::warn!("button {} not persisted: {:?}", index, e);
                        }
                        engine.after_remote_button_write(index, &store)
                    }
                    remote::Applied::Bank(changed) => {
                        if !changed {
                            ble::SNAPSHOT.signal(remote::encode_snapshot(&store));
                            continue;
                        }
                        engine.after_remote_bank_set(&store)
                    }
                };
                apply_effects(
                    effects,
                    &engine,
                    &store,
                    &mut flash,
                    &mut display,
                    &mut banner,
                )
                .await;
                ble::SNAPSHOT.signal(remote::encode_snapshot(&store));
            }
            Either3::Third(_) => {
                if banner.poll(Instant::now().as_millis()) {
                    oled::clear_status(&mut display);
                }
            }
        }

        // Settings changed through the menu take effect here.
        if engine.settings.ble_enabled != ble_enabled {
            ble_enabled = engine.settings.ble_enabled;
            info!("BLE {}", if ble_enabled { "enabled" } else { "disabled" });
            ble::set_enabled(ble_enabled);
        }
        if engine.settings.brightness != brightness {
            brightness = engine.settings.brightness;
            oled::set_brightness(&mut display, brightness);
        }
    }
}

/// Drain one effect list into the MIDI channel, the display and flash.
///
/// A bank label effect means the active bank moved, whatever the source
/// (gesture, menu or remote), so it also persists the bank pointer and
/// refreshes the snapshot.
async fn apply_effects(
    effects: Effects,
    engine: &Engine,
    store: &ConfigStore,
    flash: &mut Flash,
    display: &mut Oled,
    banner: &mut StatusBanner,
) {
    for effect in effects {
        match effect {
            Effect::Midi(message) => MIDI_OUT.send(message).await,
            Effect::ButtonVisual { index, lit, mode } => {
                oled::draw_button_box(display, store, index, lit, mode);
            }
            Effect::BankLabel(bank) => {
                oled::draw_bank_label(display, bank);
                if let Err(e) = storage::save_current_bank(flash, bank).await {
                    defmt::warn!("bank not persisted: {:?}", e);
                }
                ble::SNAPSHOT.signal(remote::encode_snapshot(store));
            }
            Effect::Status(text) => {
                banner.set(text.as_str(), Instant::now().as_millis());
                oled::draw_status(display, banner.text());
            }
            Effect::MenuRender => {
                oled::draw_menu(display, &engine.menu, &engine.settings, store);
            }
            Effect::MainRedraw => {
                let lit = core::array::from_fn(|i| engine.toggle_state(i));
                oled::draw_main(display, store, &lit);
            }
        }
    }
}
