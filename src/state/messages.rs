//! Messages handled by the state machine worker

use crate::error::{DirectorError, DirectorResult};
use crate::store::ValidatorInfo;

/// Requests that may change testnet state
#[derive(Clone, Debug)]
pub enum MachineMessage {
    /// A validator signs up for a testnet
    RegisterValidator {
        chain_id: String,
        validator: ValidatorInfo,
    },
    /// Check every testnet and switch those whose conditions are met
    GlobalSweep,
}

impl MachineMessage {
    pub fn name(&self) -> &'static str {
        match self {
            MachineMessage::RegisterValidator { .. } => "RegisterValidator",
            MachineMessage::GlobalSweep => "GlobalSweep",
        }
    }

    /// Stateless checks, run before a message is queued
    pub fn validate_basic(&self) -> DirectorResult<()> {
        match self {
            MachineMessage::RegisterValidator {
                chain_id,
                validator,
            } => {
                if chain_id.is_empty() {
                    return Err(DirectorError::InvalidInput(
                        "RegisterValidator: empty chain ID".to_string(),
                    ));
                }
                validator.decoded_pub_key()?;
                validator.net_address.validate()
            }
            MachineMessage::GlobalSweep => Ok(()),
        }
    }
}
