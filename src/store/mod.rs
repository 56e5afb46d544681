//! Testnet store
//!
//! Holds the runtime record of every configured testnet behind one coarse
//! reader/writer lock and writes every change through to the backend before
//! reporting success.
//!
//! A testnet moves from `Gathering` to `Serving` once it has enough validators
//! or once its timeout (counted from store creation) has passed. That check runs
//! after each registration and on every global sweep.

pub mod address_book;
pub mod backend;
pub mod genesis;
mod record;

pub use address_book::{AddrBook, KnownAddress};
pub use backend::{KvBackend, MemoryBackend, SledBackend};
pub use genesis::{GenesisDoc, GenesisValidator, ResultGenesis};
pub use record::{TestnetRecord, ValidatorInfo};

use crate::config::TestnetConfig;
use crate::error::{DirectorError, DirectorResult};
use crate::types::ServerState;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Registry of all configured testnets
pub struct TestnetStore {
    backend: Arc<dyn KvBackend>,
    /// Guards every read and write of the records
    testnets: RwLock<HashMap<String, TestnetRecord>>,
    config: BTreeMap<String, TestnetConfig>,
    start_time: Instant,
}

impl TestnetStore {
    /// Load one record per configured chain ID; missing records start out gathering
    pub fn open(
        backend: Arc<dyn KvBackend>,
        config: BTreeMap<String, TestnetConfig>,
    ) -> DirectorResult<Self> {
        let mut testnets = HashMap::with_capacity(config.len());
        for chain_id in config.keys() {
            let record = load_record(backend.as_ref(), chain_id).map_err(|e| {
                DirectorError::Persistence(format!(
                    "error while loading testnet {}: {}",
                    chain_id, e
                ))
            })?;
            info!(
                chain_id = %chain_id,
                state = %record.state,
                validators = record.validators.len(),
                "Testnet loaded"
            );
            testnets.insert(chain_id.clone(), record);
        }

        Ok(Self {
            backend,
            testnets: RwLock::new(testnets),
            config,
            start_time: Instant::now(),
        })
    }

    /// Re-evaluate every configured testnet.
    ///
    /// A failing testnet does not stop the sweep; the last error is returned.
    pub fn global_sweep(&self) -> DirectorResult<()> {
        let mut testnets = self.testnets.write();
        let mut result = Ok(());
        for chain_id in self.config.keys() {
            if let Err(e) = self.check_and_change_state(&mut testnets, chain_id, None) {
                error!(chain_id = %chain_id, error = %e, "State check failed");
                result = Err(e);
            }
        }
        result
    }

    /// Add (or replace) a validator and re-evaluate the testnet
    pub fn register_validator(
        &self,
        chain_id: &str,
        validator: ValidatorInfo,
    ) -> DirectorResult<()> {
        let mut testnets = self.testnets.write();
        let record = testnets
            .get(chain_id)
            .ok_or_else(|| DirectorError::UnregisteredTestnet(chain_id.to_string()))?;
        if record.state != ServerState::Gathering {
            return Err(DirectorError::NotAcceptingRegistrations(
                chain_id.to_string(),
            ));
        }

        debug!(
            chain_id = %chain_id,
            name = %validator.name,
            address = %validator.net_address,
            "Registering validator"
        );
        self.check_and_change_state(&mut testnets, chain_id, Some(validator))?;
        Ok(())
    }

    pub fn get_genesis(&self, chain_id: &str) -> DirectorResult<ResultGenesis> {
        let testnets = self.testnets.read();
        let record = serving_record(&testnets, chain_id)?;
        record
            .genesis
            .clone()
            .ok_or_else(|| DirectorError::NoGenesis(chain_id.to_string()))
    }

    pub fn get_address_book(&self, chain_id: &str) -> DirectorResult<AddrBook> {
        let testnets = self.testnets.read();
        let record = serving_record(&testnets, chain_id)?;
        record
            .address_book
            .clone()
            .ok_or_else(|| DirectorError::NoAddressBook(chain_id.to_string()))
    }

    /// Current lifecycle state of a testnet
    pub fn state(&self, chain_id: &str) -> DirectorResult<ServerState> {
        self.testnets
            .read()
            .get(chain_id)
            .map(|record| record.state)
            .ok_or_else(|| DirectorError::UnregisteredTestnet(chain_id.to_string()))
    }

    pub fn validator_count(&self, chain_id: &str) -> DirectorResult<usize> {
        self.testnets
            .read()
            .get(chain_id)
            .map(|record| record.validators.len())
            .ok_or_else(|| DirectorError::UnregisteredTestnet(chain_id.to_string()))
    }

    /// Configured chain IDs, in order
    pub fn chain_ids(&self) -> impl Iterator<Item = &str> {
        self.config.keys().map(String::as_str)
    }

    // Caller must hold the write lock.
    //
    // The change is prepared on a copy of the record and only committed once the
    // copy has been written and flushed, so memory never runs ahead of disk.
    fn check_and_change_state(
        &self,
        testnets: &mut HashMap<String, TestnetRecord>,
        chain_id: &str,
        new_validator: Option<ValidatorInfo>,
    ) -> DirectorResult<()> {
        let config = self
            .config
            .get(chain_id)
            .ok_or_else(|| DirectorError::UnregisteredTestnet(chain_id.to_string()))?;
        let current = testnets
            .get(chain_id)
            .ok_or_else(|| DirectorError::UnregisteredTestnet(chain_id.to_string()))?;

        let mut updated = current.clone();
        let mut changed = false;
        if let Some(validator) = new_validator {
            updated
                .validators
                .insert(validator.pub_key.clone(), validator);
            changed = true;
        }

        if !updated.is_serving() && self.should_serve(&updated, config) {
            self.transition_to_serving(chain_id, &mut updated);
            changed = true;
        }

        if !changed {
            return Ok(());
        }

        self.save_record(chain_id, &updated)?;
        testnets.insert(chain_id.to_string(), updated);
        Ok(())
    }

    // A quorum of zero means the testnet only waits for its timeout.
    fn should_serve(&self, record: &TestnetRecord, config: &TestnetConfig) -> bool {
        let quorum = config.required_validators > 0
            && record.validators.len() >= config.required_validators as usize;
        quorum || self.start_time.elapsed() >= config.timeout()
    }

    fn transition_to_serving(&self, chain_id: &str, record: &mut TestnetRecord) {
        record.state = ServerState::Serving;

        // Genesis and address book come from the same snapshot
        let snapshot: Vec<_> = record
            .validators
            .values()
            .filter_map(|validator| match validator.decoded_pub_key() {
                Ok(key) => Some((key, validator)),
                Err(e) => {
                    warn!(
                        chain_id = %chain_id,
                        name = %validator.name,
                        error = %e,
                        "Skipping validator with undecodable public key"
                    );
                    None
                }
            })
            .collect();

        if snapshot.is_empty() {
            warn!(
                chain_id = %chain_id,
                "Testnet serving without validators, no genesis or address book generated"
            );
            return;
        }

        let now = Utc::now();
        let genesis = GenesisDoc::generate(chain_id, now, snapshot.iter().map(|(k, v)| (k, *v)));
        let address_book = AddrBook::generate(now, snapshot.iter().map(|(_, v)| *v));
        record.genesis = Some(ResultGenesis { genesis });
        record.address_book = Some(address_book);

        info!(
            chain_id = %chain_id,
            validators = snapshot.len(),
            "Testnet switched to serving"
        );
    }

    fn save_record(&self, chain_id: &str, record: &TestnetRecord) -> DirectorResult<()> {
        let bytes = record.to_bytes()?;
        self.backend
            .set(chain_id.as_bytes(), &bytes)
            .and_then(|_| self.backend.flush())
            .map_err(|e| {
                DirectorError::Persistence(format!("failed to save testnet {}: {}", chain_id, e))
            })
    }
}

fn load_record(backend: &dyn KvBackend, chain_id: &str) -> DirectorResult<TestnetRecord> {
    match backend.get(chain_id.as_bytes())? {
        Some(bytes) => TestnetRecord::from_bytes(&bytes),
        None => Ok(TestnetRecord::new()),
    }
}

fn serving_record<'a>(
    testnets: &'a HashMap<String, TestnetRecord>,
    chain_id: &str,
) -> DirectorResult<&'a TestnetRecord> {
    let record = testnets
        .get(chain_id)
        .ok_or_else(|| DirectorError::UnregisteredTestnet(chain_id.to_string()))?;
    if !record.is_serving() {
        return Err(DirectorError::NotReady(chain_id.to_string()));
    }
    Ok(record)
}
