//! LoRa radio transport.
//!
//! The relay only needs "send this text, tell me how it went". Status is
//! always a [`ResponseStatus`]; a failed send is reported, never raised.

pub mod e32;

/// E32 response status table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResponseStatus {
    Success = 1,
    Unknown = 2,
    NotSupport = 3,
    NotImplement = 4,
    NotInitial = 5,
    InvalidParam = 6,
    DataSizeNotMatch = 7,
    BufTooSmall = 8,
    Timeout = 9,
    Hardware = 10,
    HeadNotRecognized = 11,
    NoResponseFromDevice = 12,
    WrongUartConfig = 13,
    WrongFormat = 14,
    PacketTooBig = 15,
}

impl ResponseStatus {
    /// Map a numeric code; anything outside the table is `Unknown`.
    pub fn from_code(code: u8) -> Self {
        use ResponseStatus::*;
        match code {
            1 => Success,
            3 => NotSupport,
            4 => NotImplement,
            5 => NotInitial,
            6 => InvalidParam,
            7 => DataSizeNotMatch,
            8 => BufTooSmall,
            9 => Timeout,
            10 => Hardware,
            11 => HeadNotRecognized,
            12 => NoResponseFromDevice,
            13 => WrongUartConfig,
            14 => WrongFormat,
            15 => PacketTooBig,
            _ => Unknown,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == ResponseStatus::Success
    }

    pub fn description(self) -> &'static str {
        use ResponseStatus::*;
        match self {
            Success => "Success",
            Unknown => "Unknown",
            NotSupport => "Not support!",
            NotImplement => "Not implement",
            NotInitial => "Not initial!",
            InvalidParam => "Invalid param!",
            DataSizeNotMatch => "Data size not match!",
            BufTooSmall => "Buff too small!",
            Timeout => "Timeout!!",
            Hardware => "Hardware error!",
            HeadNotRecognized => "Save mode returned not recognized!",
            NoResponseFromDevice => "No response from device! (Check wiring)",
            WrongUartConfig => "Wrong UART configuration! (BPS must be 9600 for configuration)",
            WrongFormat => "Wrong format",
            PacketTooBig => "The device support only 58byte of data transmission!",
        }
    }
}

/// Anything that can push a text message over the air.
#[allow(async_fn_in_trait)]
pub trait Radio {
    async fn send_transparent(&mut self, text: &str) -> ResponseStatus;
}
