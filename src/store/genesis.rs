//! Genesis document generation
//!
//! The JSON layout matches what Tendermint nodes expect in `genesis.json`;
//! 64-bit integers are rendered as strings.

use crate::store::ValidatorInfo;
use crate::types::PubKeyEd25519;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Voting power assigned to every genesis validator
pub const GENESIS_VALIDATOR_POWER: i64 = 10;

pub const PUBKEY_ED25519_TYPE: &str = "tendermint/PubKeyEd25519";

/// Genesis document as returned by the `genesis` endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGenesis {
    pub genesis: GenesisDoc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub genesis_time: DateTime<Utc>,
    pub chain_id: String,
    pub consensus_params: ConsensusParams,
    pub validators: Vec<GenesisValidator>,
    pub app_hash: String,
}

impl GenesisDoc {
    /// Build the genesis document for `chain_id` from a validator snapshot
    pub fn generate<'a>(
        chain_id: &str,
        genesis_time: DateTime<Utc>,
        validators: impl IntoIterator<Item = (&'a PubKeyEd25519, &'a ValidatorInfo)>,
    ) -> Self {
        let validators = validators
            .into_iter()
            .map(|(pub_key, info)| GenesisValidator {
                address: pub_key.address(),
                pub_key: PubKeyJson::ed25519(pub_key),
                power: GENESIS_VALIDATOR_POWER,
                name: info.name.clone(),
            })
            .collect();

        Self {
            genesis_time,
            chain_id: chain_id.to_string(),
            consensus_params: ConsensusParams::default(),
            validators,
            app_hash: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub address: String,
    pub pub_key: PubKeyJson,
    #[serde(with = "int64_string")]
    pub power: i64,
    pub name: String,
}

/// Amino JSON form of a public key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyJson {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

impl PubKeyJson {
    pub fn ed25519(key: &PubKeyEd25519) -> Self {
        Self {
            key_type: PUBKEY_ED25519_TYPE.to_string(),
            value: key.to_base64(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConsensusParams {
    pub block: BlockParams,
    pub evidence: EvidenceParams,
    pub validator: ValidatorParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    #[serde(with = "int64_string")]
    pub max_bytes: i64,
    #[serde(with = "int64_string")]
    pub max_gas: i64,
    #[serde(with = "int64_string")]
    pub time_iota_ms: i64,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            max_bytes: 22_020_096, // 21MB
            max_gas: -1,
            time_iota_ms: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    #[serde(with = "int64_string")]
    pub max_age_num_blocks: i64,
    /// Nanoseconds
    #[serde(with = "int64_string")]
    pub max_age_duration: i64,
}

impl Default for EvidenceParams {
    fn default() -> Self {
        Self {
            max_age_num_blocks: 100_000,
            max_age_duration: 48 * 60 * 60 * 1_000_000_000, // 48h
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParams {
    pub pub_key_types: Vec<String>,
}

impl Default for ValidatorParams {
    fn default() -> Self {
        Self {
            pub_key_types: vec!["ed25519".to_string()],
        }
    }
}

mod int64_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
