//! Board-level peripherals: battery sense and chip identity.

use ble2lora::config::E32_BAUD;
use ble2lora::tasks::battery::BatterySensor;
use embassy_nrf::gpio::Input;
use embassy_nrf::saadc::Saadc;
use embassy_nrf::uarte::Baudrate;

/// UARTE setting matching the module's configured air-side baud rate.
pub const E32_UARTE_BAUD: Baudrate = Baudrate::BAUD9600;
const _: () = assert!(E32_BAUD == 9_600);

/// SAADC channel 0 on the divided battery rail, plus the USB-present pin.
pub struct BoardBattery {
    adc: Saadc<'static, 1>,
    usb: Input<'static>,
}

impl BoardBattery {
    pub fn new(adc: Saadc<'static, 1>, usb: Input<'static>) -> Self {
        Self { adc, usb }
    }
}

impl BatterySensor for BoardBattery {
    async fn sample(&mut self) -> i16 {
        let mut buf = [0i16; 1];
        self.adc.sample(&mut buf).await;
        buf[0]
    }

    fn usb_powered(&mut self) -> bool {
        self.usb.is_high()
    }
}

/// 64-bit factory device id from FICR.
pub fn chip_id() -> [u8; 8] {
    let lo = embassy_nrf::pac::FICR.deviceid(0).read();
    let hi = embassy_nrf::pac::FICR.deviceid(1).read();
    let mut id = [0u8; 8];
    id[..4].copy_from_slice(&hi.to_be_bytes());
    id[4..].copy_from_slice(&lo.to_be_bytes());
    id
}
