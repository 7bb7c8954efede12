//! Message descriptors for the supported PLC protocols.
//!
//! | Descriptor | Protocol | Header |
//! |------------|----------|--------|
//! | [`S7Message`] | Siemens S7 (TPKT) | fixed 4 |
//! | [`FetchWriteMessage`] | Siemens Fetch/Write | fixed 16, length from request |
//! | [`SiemensPpiMessage`] | Siemens PPI | dynamic |
//! | [`ModbusTcpMessage`] | Modbus TCP | fixed 8 |
//! | [`ModbusRtuMessage`] | Modbus RTU | fixed 2, grows to 3 |
//! | [`ModbusAsciiMessage`] | Modbus ASCII | CR LF |
//! | [`FinsTcpMessage`] | Omron FINS/TCP | fixed 8 |
//! | [`FinsUdpMessage`] | Omron FINS/UDP | dynamic |
//! | [`AdsMessage`] | Beckhoff ADS | fixed 6 |
//! | [`EtherNetIpMessage`] | EtherNet/IP encapsulation | fixed 24 |
//! | [`GeSrtpMessage`] | GE SRTP | fixed 56 |
//! | [`FujiSphMessage`] | Fuji SPH | fixed 20 |
//! | [`MelsecA1EMessage`] | MELSEC MC 1E | fixed 2, length from request |
//! | [`MelsecQna3EMessage`] | MELSEC MC 3E | fixed 9 |
//! | [`MelsecQna4EMessage`] | MELSEC MC 4E | fixed 13 |
//! | [`MelsecFxLinksMessage`] | MELSEC computer link | dynamic |
//! | [`KukaVarProxyMessage`] | KUKA VarProxy | fixed 4 |
//! | [`MewtocolMessage`] | Panasonic Mewtocol-COM | CR |
//! | [`SpecifiedCharacterMessage`] | any terminator-delimited protocol | configurable |
//!
//! Descriptors that own a per-connection counter (`ModbusTcpMessage`,
//! `FinsUdpMessage`, `MelsecQna4EMessage`) are meant to live next to the
//! connection's [`FrameReceiver`](crate::FrameReceiver), one per
//! connection.

mod beckhoff;
mod fuji;
mod ge;
mod generic;
mod kuka;
mod melsec;
mod modbus;
mod omron;
mod panasonic;
mod rockwell;
mod siemens;

pub use beckhoff::{AdsMessage, AMS_HEADER_SIZE, AMS_TCP_HEADER_SIZE};
pub use fuji::{FujiSphMessage, SPH_HEADER_SIZE};
pub use ge::{GeSrtpMessage, SRTP_HEADER_SIZE};
pub use generic::SpecifiedCharacterMessage;
pub use kuka::{KukaVarProxyMessage, KUKA_HEADER_SIZE};
pub use melsec::{
    MelsecA1EMessage, MelsecFxLinksMessage, MelsecQna3EMessage, MelsecQna4EMessage,
    A1E_REQUEST_SIZE,
};
pub use modbus::{
    ModbusAsciiMessage, ModbusRtuMessage, ModbusTcpMessage, MODBUS_TCP_HEADER_SIZE,
    MODBUS_TCP_MAX_BODY,
};
pub use omron::{
    FinsTcpMessage, FinsUdpMessage, FINS_HEADER_SIZE, FINS_MAGIC, FINS_TCP_HEADER_SIZE,
    FINS_TCP_MAX_LENGTH, MIN_RESPONSE_SIZE,
};
pub use panasonic::MewtocolMessage;
pub use rockwell::{EtherNetIpMessage, ENIP_HEADER_SIZE};
pub use siemens::{
    FetchWriteMessage, S7Message, SiemensPpiMessage, FETCH_WRITE_HEADER_SIZE, PPI_ACK,
    TPKT_HEADER_SIZE,
};
