//! SOCKS5 Protocol Types

use std::fmt;
use std::net::Ipv4Addr;

use crate::protocol::constants::*;

/// Requested proxy operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
    /// Any command byte outside the SOCKS5 command set
    Unknown(u8),
}

impl Command {
    /// Get the command code for this command
    pub fn command_code(&self) -> u8 {
        match self {
            Command::Connect => SOCKS5_CMD_CONNECT,
            Command::Bind => SOCKS5_CMD_BIND,
            Command::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
            Command::Unknown(code) => *code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            SOCKS5_CMD_CONNECT => Command::Connect,
            SOCKS5_CMD_BIND => Command::Bind,
            SOCKS5_CMD_UDP_ASSOCIATE => Command::UdpAssociate,
            other => Command::Unknown(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => write!(f, "CONNECT"),
            Command::Bind => write!(f, "BIND"),
            Command::UdpAssociate => write!(f, "UDP ASSOCIATE"),
            Command::Unknown(code) => write!(f, "UNKNOWN({:#04x})", code),
        }
    }
}

/// Destination address carried by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ipv4(Ipv4Addr),
    Domain(String),
}

impl TargetAddr {
    /// Get the address type code for this address
    pub fn address_type(&self) -> u8 {
        match self {
            TargetAddr::Ipv4(_) => SOCKS5_ADDR_IPV4,
            TargetAddr::Domain(_) => SOCKS5_ADDR_DOMAIN,
        }
    }

    /// Host part as it is dialed: dotted-decimal or the domain name
    pub fn host(&self) -> String {
        match self {
            TargetAddr::Ipv4(ip) => ip.to_string(),
            TargetAddr::Domain(domain) => domain.clone(),
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(ip) => write!(f, "{}", ip),
            TargetAddr::Domain(domain) => write!(f, "{}", domain),
        }
    }
}

/// Parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub target: TargetAddr,
    pub port: u16,
}

impl Request {
    /// `host:port` string used for dialing and logging
    pub fn destination(&self) -> String {
        format!("{}:{}", self.target.host(), self.port)
    }
}

/// Reply status codes emitted by this server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    Succeeded = SOCKS5_REPLY_SUCCESS,
    GeneralFailure = SOCKS5_REPLY_GENERAL_FAILURE,
    CommandNotSupported = SOCKS5_REPLY_COMMAND_NOT_SUPPORTED,
    AddressTypeNotSupported = SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

/// SOCKS5 reply
///
/// The bound address is always reported as IPv4; this server reports
/// `0.0.0.0:0` for every reply, which clients accept for CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyCode,
    pub bound_addr: Ipv4Addr,
    pub bound_port: u16,
}

impl Reply {
    /// Create a reply with a zero-filled bound address
    pub fn new(status: ReplyCode) -> Self {
        Self {
            status,
            bound_addr: Ipv4Addr::UNSPECIFIED,
            bound_port: 0,
        }
    }

    /// Create a success response
    pub fn success() -> Self {
        Self::new(ReplyCode::Succeeded)
    }

    /// Serialize to the wire format
    ///
    /// ```text
    /// +----+-----+-------+------+----------+----------+
    /// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    /// +----+-----+-------+------+----------+----------+
    /// | 1  |  1  | X'00' |  1   |    4     |    2     |
    /// +----+-----+-------+------+----------+----------+
    /// ```
    pub fn to_bytes(&self) -> [u8; SOCKS5_REPLY_LEN] {
        let mut bytes = [0u8; SOCKS5_REPLY_LEN];
        bytes[0] = SOCKS5_VERSION;
        bytes[1] = self.status.into();
        bytes[2] = SOCKS5_RESERVED;
        bytes[3] = SOCKS5_ADDR_IPV4;
        bytes[4..8].copy_from_slice(&self.bound_addr.octets());
        bytes[8..10].copy_from_slice(&self.bound_port.to_be_bytes());
        bytes
    }
}
