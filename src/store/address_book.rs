//! Seed address book generation
//!
//! Entries use the layout of a peer-exchange `addrbook.json`, so a node can
//! start from the file as is.

use crate::store::ValidatorInfo;
use crate::types::NetAddress;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Bucket type of addresses never connected to
pub const BUCKET_TYPE_NEW: u8 = 0x01;

/// Bucket every generated entry is placed in
pub const INITIAL_BUCKET: i32 = 1;

/// Random bytes in the book key (hex encoded, so twice as many digits)
const ADDR_BOOK_KEY_BYTES: usize = 12;

/// A peer address with its connection bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAddress {
    pub addr: NetAddress,
    pub src: NetAddress,
    pub buckets: Vec<i32>,
    pub attempts: i32,
    pub bucket_type: u8,
    pub last_attempt: DateTime<Utc>,
    pub last_success: DateTime<Utc>,
}

impl KnownAddress {
    /// Fresh entry that names itself as its source
    pub fn new_self_sourced(addr: NetAddress, now: DateTime<Utc>) -> Self {
        Self {
            src: addr.clone(),
            addr,
            buckets: vec![INITIAL_BUCKET],
            attempts: 0,
            bucket_type: BUCKET_TYPE_NEW,
            last_attempt: now,
            last_success: now,
        }
    }
}

/// Address book as returned by the `addrbook` endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrBook {
    pub key: String,
    pub addrs: Vec<KnownAddress>,
}

impl AddrBook {
    /// One entry per validator, under a freshly generated book key
    pub fn generate<'a>(
        now: DateTime<Utc>,
        validators: impl IntoIterator<Item = &'a ValidatorInfo>,
    ) -> Self {
        let addrs = validators
            .into_iter()
            .map(|validator| KnownAddress::new_self_sourced(validator.net_address.clone(), now))
            .collect();

        Self {
            key: random_book_key(),
            addrs,
        }
    }
}

fn random_book_key() -> String {
    let mut bytes = [0u8; ADDR_BOOK_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
