//! Persisted per-testnet records

use crate::error::DirectorResult;
use crate::store::address_book::AddrBook;
use crate::store::genesis::ResultGenesis;
use crate::types::{NetAddress, PubKeyEd25519, ServerState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validator that signed up for a testnet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub net_address: NetAddress,
    pub name: String,
    /// Standard base64 encoding of the ed25519 public key
    pub pub_key: String,
}

impl ValidatorInfo {
    pub fn new(net_address: NetAddress, name: impl Into<String>, pub_key: impl Into<String>) -> Self {
        Self {
            net_address,
            name: name.into(),
            pub_key: pub_key.into(),
        }
    }

    pub fn decoded_pub_key(&self) -> DirectorResult<PubKeyEd25519> {
        PubKeyEd25519::from_base64(&self.pub_key)
    }
}

/// Runtime state of one testnet, stored under its chain ID
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestnetRecord {
    pub state: ServerState,
    /// Keyed by base64 public key
    pub validators: BTreeMap<String, ValidatorInfo>,
    pub genesis: Option<ResultGenesis>,
    pub address_book: Option<AddrBook>,
}

impl TestnetRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_serving(&self) -> bool {
        self.state == ServerState::Serving
    }

    pub fn to_bytes(&self) -> DirectorResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> DirectorResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
