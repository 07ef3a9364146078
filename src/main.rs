//! ble2lora firmware entry point (nRF52840 + SoftDevice S140).
//!
//! Spawns one task per component. All logic lives in the `ble2lora`
//! library; this file only builds the concrete hardware instances and
//! wires them together through statics.

#![no_std]
#![no_main]

mod hw;

use ble2lora::ble::channel::Inboxes;
use ble2lora::ble::device_info::DeviceInfo;
use ble2lora::ble::manager::SessionManager;
use ble2lora::config::ATT_MTU;
use ble2lora::project::{self, ProjectCell};
use ble2lora::radio::e32::E32;
use ble2lora::session::SessionState;
use ble2lora::tasks::battery::BatteryReporter;
use ble2lora::tasks::indicator::Indicator;
use ble2lora::tasks::liveness::LivenessMonitor;
use ble2lora::tasks::project::ProjectConfigurator;
use ble2lora::tasks::relay::MessageRelay;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::saadc::{self, ChannelConfig, Saadc};
use embassy_nrf::uarte::{self, UarteTx};
use embassy_nrf::bind_interrupts;
use embassy_time::Delay;
use nrf_softdevice::{raw, Flash, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use hw::board::{chip_id, BoardBattery, E32_UARTE_BAUD};
use hw::gatt::Server;
use hw::softdevice::{
    publish_device_info, ConnSlot, SoftdeviceOutbound, SoftdevicePeripheral, Subscriptions,
};
use hw::storage::FlashProjectStore;

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
    UARTE0_UART0 => uarte::InterruptHandler<UARTE0>;
});

// ═══════════════════════════════════════════════════════════════════════════
// Shared state
// ═══════════════════════════════════════════════════════════════════════════

static SESSION: SessionState = SessionState::new();
static INBOXES: Inboxes = Inboxes::new();
static PROJECT: ProjectCell = ProjectCell::new();
static CONN: ConnSlot = ConnSlot::new();
static SUBSCRIPTIONS: Subscriptions = Subscriptions::new();

static SERVER: StaticCell<Server> = StaticCell::new();
static OUTBOUND: StaticCell<SoftdeviceOutbound> = StaticCell::new();

type LoraRadio = E32<UarteTx<'static, UARTE0>, Output<'static>, Output<'static>, Input<'static>, Delay>;
type Outbound = SoftdeviceOutbound;

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn session_task(mut manager: SessionManager<'static, SoftdevicePeripheral, Outbound, Delay>) -> ! {
    manager.run().await
}

#[embassy_executor::task]
async fn relay_task(mut relay: MessageRelay<'static, LoraRadio, Outbound, Delay>) -> ! {
    relay.run().await
}

#[embassy_executor::task]
async fn project_task(
    mut task: ProjectConfigurator<'static, FlashProjectStore<Flash>, Outbound, Delay>,
) -> ! {
    task.run().await
}

#[embassy_executor::task]
async fn liveness_task(mut monitor: LivenessMonitor<'static, Delay>) -> ! {
    monitor.run().await
}

#[embassy_executor::task]
async fn battery_task(mut reporter: BatteryReporter<'static, BoardBattery, Outbound, Delay>) -> ! {
    reporter.run().await
}

#[embassy_executor::task]
async fn indicator_task(mut indicator: Indicator<'static, Output<'static>, Delay>) -> ! {
    indicator.run().await
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry point
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble2lora {} starting", env!("CARGO_PKG_VERSION"));

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::SAADC.set_priority(Priority::P3);
    interrupt::UARTE0_UART0.set_priority(Priority::P3);

    // - SoftDevice ---------------------------------------------------------
    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
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
        common_vs_uuid: Some(raw::ble_common_cfg_vs_uuid_t { vs_uuid_count: 4 }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    let server: &'static Server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let info = DeviceInfo::new(chip_id());
    info!("serial {}", info.serial.as_str());
    publish_device_info(server, &info);

    // - Project number -----------------------------------------------------
    let mut store = FlashProjectStore::new(Flash::take(sd));
    let current = project::load_or_init(&mut store).await;
    info!("Project No: {}", current.as_str());
    if server.project.number_set(&unwrap!(heapless::Vec::from_slice(current.as_bytes()))).is_err() {
        defmt::warn!("failed to publish project number");
    }
    PROJECT.set(current);

    // - Radio --------------------------------------------------------------
    let mut uart_config = uarte::Config::default();
    uart_config.baudrate = E32_UARTE_BAUD;
    let uart = UarteTx::new(p.UARTE0, Irqs, p.P0_06, uart_config);
    let m0 = Output::new(p.P0_03, Level::Low, OutputDrive::Standard);
    let m1 = Output::new(p.P0_28, Level::Low, OutputDrive::Standard);
    let aux = Input::new(p.P0_30, Pull::Up);
    let mut radio = E32::new(uart, m0, m1, aux, Delay);
    let status = radio.begin().await;
    info!("Initialization: {}", status.description());

    // - Battery ------------------------------------------------------------
    let adc = Saadc::new(
        p.SAADC,
        Irqs,
        saadc::Config::default(),
        [ChannelConfig::single_ended(p.P0_04)],
    );
    adc.calibrate().await;
    let battery = BoardBattery::new(adc, Input::new(p.P0_31, Pull::None));

    // - Tasks --------------------------------------------------------------
    let outbound: &'static Outbound = OUTBOUND.init(SoftdeviceOutbound::new(server, &CONN, &SUBSCRIPTIONS));
    let peripheral = SoftdevicePeripheral::new(sd, server, &CONN, &SUBSCRIPTIONS);
    let led = Output::new(p.P0_13, Level::High, OutputDrive::Standard);

    unwrap!(spawner.spawn(session_task(SessionManager::new(
        peripheral, outbound, Delay, &SESSION, &PROJECT, &INBOXES,
    ))));
    unwrap!(spawner.spawn(relay_task(MessageRelay::new(
        &SESSION,
        &INBOXES.uart_rx,
        radio,
        outbound,
        Delay,
    ))));
    unwrap!(spawner.spawn(project_task(ProjectConfigurator::new(
        &SESSION,
        &INBOXES.project_number,
        store,
        &PROJECT,
        outbound,
        Delay,
    ))));
    unwrap!(spawner.spawn(liveness_task(LivenessMonitor::new(
        &SESSION,
        &INBOXES.keepalive,
        Delay,
    ))));
    unwrap!(spawner.spawn(battery_task(BatteryReporter::new(
        &SESSION, battery, outbound, Delay,
    ))));
    unwrap!(spawner.spawn(indicator_task(Indicator::new(&SESSION, led, Delay))));

    info!("all tasks started");
}
