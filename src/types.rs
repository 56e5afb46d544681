//! Core types shared by the store, the state machine and the RPC layer.

use crate::error::{DirectorError, DirectorResult};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Decoded size of an ed25519 public key
pub const ED25519_PUBKEY_SIZE: usize = 32;

/// Size of a node ID in bytes (hex encoded on the wire)
pub const NODE_ID_BYTE_LENGTH: usize = 20;

/// Lifecycle state of a testnet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// Collecting validator registrations
    #[default]
    Gathering,
    /// Genesis and address book are frozen and served
    Serving,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Gathering => write!(f, "gathering"),
            ServerState::Serving => write!(f, "serving"),
        }
    }
}

/// ed25519 public key of a validator
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PubKeyEd25519(pub [u8; ED25519_PUBKEY_SIZE]);

impl PubKeyEd25519 {
    /// Decode a standard base64 key and check its length
    pub fn from_base64(encoded: &str) -> DirectorResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DirectorError::InvalidInput(format!("invalid public key: {}", e)))?;
        if bytes.len() != ED25519_PUBKEY_SIZE {
            return Err(DirectorError::InvalidInput(format!(
                "invalid ed25519 public key length: expected {}, got {}",
                ED25519_PUBKEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; ED25519_PUBKEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Validator address: first 20 bytes of SHA-256 over the raw key, upper-case hex
    pub fn address(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode_upper(&digest[..NODE_ID_BYTE_LENGTH])
    }
}

impl fmt::Debug for PubKeyEd25519 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKeyEd25519({})", self.to_base64())
    }
}

/// Peer network address in the `ID@IP:PORT` form
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetAddress {
    pub id: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl NetAddress {
    pub fn new(id: impl Into<String>, ip: IpAddr, port: u16) -> Self {
        Self {
            id: id.into(),
            ip,
            port,
        }
    }

    /// Check that the address is routable enough to be handed to peers
    pub fn validate(&self) -> DirectorResult<()> {
        validate_node_id(&self.id)?;
        if self.ip.is_unspecified() || self.ip == IpAddr::V4(Ipv4Addr::BROADCAST) {
            return Err(DirectorError::InvalidInput(format!(
                "invalid IP address: {}",
                self.ip
            )));
        }
        if self.port == 0 {
            return Err(DirectorError::InvalidInput("invalid port: 0".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, SocketAddr::new(self.ip, self.port))
    }
}

impl FromStr for NetAddress {
    type Err = DirectorError;

    fn from_str(addr: &str) -> Result<Self, Self::Err> {
        let addr = addr.strip_prefix("tcp://").unwrap_or(addr);
        let (id, host) = addr.split_once('@').ok_or_else(|| {
            DirectorError::InvalidInput(format!("address ({}) does not contain ID", addr))
        })?;
        validate_node_id(id)?;
        let socket: SocketAddr = host.parse().map_err(|e| {
            DirectorError::InvalidInput(format!("invalid address ({}): {}", host, e))
        })?;
        Ok(Self::new(id.to_lowercase(), socket.ip(), socket.port()))
    }
}

fn validate_node_id(id: &str) -> DirectorResult<()> {
    if id.is_empty() {
        return Err(DirectorError::InvalidInput("no ID".to_string()));
    }
    let bytes = hex::decode(id)
        .map_err(|e| DirectorError::InvalidInput(format!("invalid hex in ID ({}): {}", id, e)))?;
    if bytes.len() != NODE_ID_BYTE_LENGTH {
        return Err(DirectorError::InvalidInput(format!(
            "invalid ID length: expected {} bytes, got {}",
            NODE_ID_BYTE_LENGTH,
            bytes.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_ID: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

    #[test]
    fn test_parse_ipv4_address() {
        let addr: NetAddress = format!("{}@127.0.0.1:26656", NODE_ID).parse().unwrap();
        assert_eq!(addr.id, NODE_ID);
        assert_eq!(addr.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port, 26656);
        assert!(addr.validate().is_ok());
        assert_eq!(addr.to_string(), format!("{}@127.0.0.1:26656", NODE_ID));
    }

    #[test]
    fn test_parse_ipv6_and_scheme() {
        let addr: NetAddress = format!("tcp://{}@[::1]:26656", NODE_ID).parse().unwrap();
        assert!(addr.ip.is_ipv6());
        assert_eq!(addr.to_string(), format!("{}@[::1]:26656", NODE_ID));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("127.0.0.1:26656".parse::<NetAddress>().is_err());
        assert!("zz@127.0.0.1:26656".parse::<NetAddress>().is_err());
        assert!("deadbeef@127.0.0.1:26656".parse::<NetAddress>().is_err());
        assert!(format!("{}@127.0.0.1", NODE_ID).parse::<NetAddress>().is_err());
        assert!(format!("{}@127.0.0.1:99999", NODE_ID)
            .parse::<NetAddress>()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_unroutable() {
        let unspecified: NetAddress = format!("{}@0.0.0.0:26656", NODE_ID).parse().unwrap();
        assert!(matches!(
            unspecified.validate(),
            Err(DirectorError::InvalidInput(_))
        ));

        let broadcast: NetAddress = format!("{}@255.255.255.255:26656", NODE_ID)
            .parse()
            .unwrap();
        assert!(broadcast.validate().is_err());

        let no_port: NetAddress = format!("{}@10.0.0.1:0", NODE_ID).parse().unwrap();
        assert!(no_port.validate().is_err());
    }

    #[test]
    fn test_pubkey_base64() {
        let key = PubKeyEd25519([7u8; 32]);
        let decoded = PubKeyEd25519::from_base64(&key.to_base64()).unwrap();
        assert_eq!(decoded, key);

        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 31]);
        assert!(matches!(
            PubKeyEd25519::from_base64(&short),
            Err(DirectorError::InvalidInput(_))
        ));
        assert!(PubKeyEd25519::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_pubkey_address() {
        let key = PubKeyEd25519([0u8; 32]);
        let address = key.address();
        assert_eq!(address.len(), NODE_ID_BYTE_LENGTH * 2);
        assert_eq!(address, address.to_uppercase());
        // SHA-256 of 32 zero bytes starts with 66687aad...
        assert!(address.starts_with("66687AAD"));
    }

    #[test]
    fn test_server_state_default() {
        assert_eq!(ServerState::default(), ServerState::Gathering);
        assert_eq!(ServerState::Serving.to_string(), "serving");
    }
}
