//! Hardware bindings for the nRF52840 target.

pub mod board;
pub mod gatt;
pub mod softdevice;
pub mod storage;
