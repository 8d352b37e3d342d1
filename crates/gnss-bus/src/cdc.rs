//! CDC/ACM control transfer constants and line coding
//!
//! GNSS receivers that enumerate as CDC/ACM serial devices are configured
//! and probed through standard class requests on the control endpoint.

use serde::{Deserialize, Serialize};

/// Communications device class code
pub const CLASS_COMM: u8 = 0x02;
/// Abstract Control Model subclass code
pub const SUBCLASS_ACM: u8 = 0x02;

/// bmRequestType: class request, host to interface
pub const REQUEST_TYPE_HOST_TO_INTERFACE: u8 = 0x21;
/// bmRequestType: class request, interface to host
pub const REQUEST_TYPE_INTERFACE_TO_HOST: u8 = 0xA1;

/// SET_LINE_CODING class request
pub const SET_LINE_CODING: u8 = 0x20;
/// GET_LINE_CODING class request
pub const GET_LINE_CODING: u8 = 0x21;
/// SET_CONTROL_LINE_STATE class request
pub const SET_CONTROL_LINE_STATE: u8 = 0x22;

/// DTR bit for SET_CONTROL_LINE_STATE
pub const CONTROL_LINE_DTR: u16 = 0x01;
/// RTS bit for SET_CONTROL_LINE_STATE
pub const CONTROL_LINE_RTS: u16 = 0x02;

/// Wire size of an encoded line coding block
pub const LINE_CODING_LEN: usize = 7;

/// Serial line parameters carried by SET/GET_LINE_CODING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCoding {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Stop bits: 0 = 1 stop bit, 1 = 1.5, 2 = 2
    pub stop_bits: u8,
    /// Parity: 0 = none, 1 = odd, 2 = even
    pub parity: u8,
    /// Data bits per character
    pub data_bits: u8,
}

impl LineCoding {
    /// Encode as the 7-byte block the class request carries
    pub fn encode(&self) -> [u8; LINE_CODING_LEN] {
        let rate = self.baud_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits,
            self.parity,
            self.data_bits,
        ]
    }

    /// Decode from a 7-byte block, if long enough
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < LINE_CODING_LEN {
            return None;
        }
        Some(Self {
            baud_rate: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            stop_bits: data[4],
            parity: data[5],
            data_bits: data[6],
        })
    }
}

impl Default for LineCoding {
    /// 9600 8N1, the common power-on configuration for GNSS receivers
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            stop_bits: 0,
            parity: 0,
            data_bits: 8,
        }
    }
}
