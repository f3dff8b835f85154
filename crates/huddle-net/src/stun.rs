//! Minimal STUN (RFC 5389) Binding request codec.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use huddle_common::{Error, Result};

pub const STUN_MAGIC_COOKIE: u32 = 0x2112A442;
pub const BINDING_REQUEST: u16 = 0x0001;
pub const BINDING_RESPONSE: u16 = 0x0101;
pub const STUN_HEADER_SIZE: usize = 20;

const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const FAMILY_IPV4: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunMessage {
    pub msg_type: u16,
    pub transaction_id: [u8; 12],
}

impl StunMessage {
    pub fn new_binding_request() -> Self {
        use rand::RngCore;
        let mut transaction_id = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut transaction_id);
        Self {
            msg_type: BINDING_REQUEST,
            transaction_id,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(STUN_HEADER_SIZE);
        buf.extend_from_slice(&self.msg_type.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes()); // Length
        buf.extend_from_slice(&STUN_MAGIC_COOKIE.to_be_bytes());
        buf.extend_from_slice(&self.transaction_id);
        buf
    }

    /// Decode the mapped address from a Binding response answering `self`.
    pub fn decode_response(&self, buf: &[u8]) -> Result<SocketAddr> {
        if buf.len() < STUN_HEADER_SIZE {
            return Err(Error::protocol("STUN message too short"));
        }
        if buf[8..20] != self.transaction_id {
            return Err(Error::protocol("STUN transaction id mismatch"));
        }
        decode_address(buf)
    }
}

/// Extract the reflexive address from a Binding response.
///
/// XOR-MAPPED-ADDRESS is preferred; plain MAPPED-ADDRESS is accepted for
/// servers that predate RFC 5389.
pub fn decode_address(buf: &[u8]) -> Result<SocketAddr> {
    if buf.len() < STUN_HEADER_SIZE {
        return Err(Error::protocol("STUN message too short"));
    }

    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    if msg_type != BINDING_RESPONSE {
        return Err(Error::protocol(format!(
            "not a binding response: 0x{:04x}",
            msg_type
        )));
    }

    let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if cookie != STUN_MAGIC_COOKIE {
        return Err(Error::protocol("invalid magic cookie"));
    }

    let declared = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let end = (STUN_HEADER_SIZE + declared).min(buf.len());
    let mut pos = STUN_HEADER_SIZE;
    let mut mapped = None;

    while pos + 4 <= end {
        let attr_type = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        let attr_len = u16::from_be_bytes([buf[pos + 2], buf[pos + 3]]) as usize;
        pos += 4;

        if pos + attr_len > end {
            break;
        }
        let value = &buf[pos..pos + attr_len];

        match attr_type {
            ATTR_XOR_MAPPED_ADDRESS => return decode_ipv4_attr(value, true),
            ATTR_MAPPED_ADDRESS if mapped.is_none() => {
                mapped = Some(decode_ipv4_attr(value, false));
            }
            _ => {}
        }

        pos += attr_len;
        // Attributes are padded to 32-bit boundaries.
        if pos % 4 != 0 {
            pos += 4 - (pos % 4);
        }
    }

    mapped.unwrap_or_else(|| Err(Error::protocol("no mapped address in STUN response")))
}

fn decode_ipv4_attr(value: &[u8], xored: bool) -> Result<SocketAddr> {
    if value.len() < 8 {
        return Err(Error::protocol("invalid mapped address length"));
    }
    if value[1] != FAMILY_IPV4 {
        return Err(Error::protocol(format!(
            "unsupported address family 0x{:02x}",
            value[1]
        )));
    }

    let mut port = u16::from_be_bytes([value[2], value[3]]);
    let mut octets = [value[4], value[5], value[6], value[7]];
    if xored {
        port ^= (STUN_MAGIC_COOKIE >> 16) as u16;
        for (octet, key) in octets.iter_mut().zip(STUN_MAGIC_COOKIE.to_be_bytes()) {
            *octet ^= key;
        }
    }

    Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
}
