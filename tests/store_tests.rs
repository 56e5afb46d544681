//! Integration tests for the testnet store on a sled database
//!
//! Walks the registration and serving flows end-to-end, including reopening
//! the database after a transition.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;
use testnet_director::{
    DirectorError, KvBackend, NetAddress, PubKeyEd25519, ServerState, SledBackend, TestnetConfig,
    TestnetRecord, TestnetStore, ValidatorInfo,
};

// ============================================================================
// TEST HELPERS
// ============================================================================

const HOUR: Duration = Duration::from_secs(3600);

fn validator(seed: u8, name: &str) -> ValidatorInfo {
    let net_address = NetAddress::new(
        hex::encode([seed; 20]),
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, seed)),
        26656,
    );
    ValidatorInfo::new(net_address, name, PubKeyEd25519([seed; 32]).to_base64())
}

fn testnets(entries: &[(&str, u32, Duration)]) -> BTreeMap<String, TestnetConfig> {
    entries
        .iter()
        .map(|(chain_id, required, timeout)| {
            (chain_id.to_string(), TestnetConfig::new(*required, *timeout))
        })
        .collect()
}

fn open_store(path: &std::path::Path, config: BTreeMap<String, TestnetConfig>) -> TestnetStore {
    let backend = Arc::new(SledBackend::open(path).unwrap());
    TestnetStore::open(backend, config).unwrap()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_quorum_switches_to_serving() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path(), testnets(&[("net1", 2, HOUR)]));

    store.register_validator("net1", validator(1, "v1")).unwrap();
    assert_eq!(store.state("net1").unwrap(), ServerState::Gathering);

    store.register_validator("net1", validator(2, "v2")).unwrap();
    assert_eq!(store.state("net1").unwrap(), ServerState::Serving);

    let genesis = store.get_genesis("net1").unwrap().genesis;
    assert_eq!(genesis.chain_id, "net1");
    assert_eq!(genesis.validators.len(), 2);
    assert!(genesis.validators.iter().all(|v| v.power == 10));

    let book = store.get_address_book("net1").unwrap();
    assert_eq!(book.addrs.len(), 2);
}

#[test]
fn test_zero_timeout_serves_without_artifacts() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path(), testnets(&[("net2", 5, Duration::ZERO)]));

    store.global_sweep().unwrap();
    assert_eq!(store.state("net2").unwrap(), ServerState::Serving);
    assert!(matches!(
        store.get_genesis("net2"),
        Err(DirectorError::NoGenesis(_))
    ));
    assert!(matches!(
        store.get_address_book("net2"),
        Err(DirectorError::NoAddressBook(_))
    ));
    assert!(matches!(
        store.register_validator("net2", validator(1, "late")),
        Err(DirectorError::NotAcceptingRegistrations(_))
    ));
}

#[test]
fn test_unconfigured_chain_is_rejected_everywhere() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path(), testnets(&[("net1", 2, HOUR)]));

    assert!(matches!(
        store.register_validator("ghost", validator(1, "v1")),
        Err(DirectorError::UnregisteredTestnet(_))
    ));
    assert!(matches!(
        store.get_genesis("ghost"),
        Err(DirectorError::UnregisteredTestnet(_))
    ));
    assert!(matches!(
        store.get_address_book("ghost"),
        Err(DirectorError::UnregisteredTestnet(_))
    ));
    assert!(matches!(
        store.state("ghost"),
        Err(DirectorError::UnregisteredTestnet(_))
    ));
}

#[test]
fn test_gathering_testnet_is_not_ready() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path(), testnets(&[("net1", 3, HOUR)]));

    store.register_validator("net1", validator(1, "v1")).unwrap();
    store.register_validator("net1", validator(2, "v2")).unwrap();

    assert!(matches!(
        store.get_genesis("net1"),
        Err(DirectorError::NotReady(_))
    ));
    assert!(matches!(
        store.get_address_book("net1"),
        Err(DirectorError::NotReady(_))
    ));
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn test_serving_testnet_is_frozen() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path(), testnets(&[("net1", 1, HOUR)]));

    store.register_validator("net1", validator(1, "v1")).unwrap();
    let genesis = store.get_genesis("net1").unwrap();
    let book = store.get_address_book("net1").unwrap();

    assert!(store.register_validator("net1", validator(2, "v2")).is_err());
    store.global_sweep().unwrap();
    store.global_sweep().unwrap();

    assert_eq!(store.get_genesis("net1").unwrap(), genesis);
    assert_eq!(store.get_address_book("net1").unwrap(), book);
    assert_eq!(store.validator_count("net1").unwrap(), 1);
}

#[test]
fn test_artifacts_describe_the_same_validators() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path(), testnets(&[("net1", 3, HOUR)]));

    for seed in 1..=3 {
        store
            .register_validator("net1", validator(seed, &format!("v{}", seed)))
            .unwrap();
    }

    let genesis = store.get_genesis("net1").unwrap().genesis;
    let book = store.get_address_book("net1").unwrap();
    assert_eq!(genesis.validators.len(), book.addrs.len());

    for seed in 1..=3u8 {
        let key = PubKeyEd25519([seed; 32]);
        let in_genesis = genesis
            .validators
            .iter()
            .find(|v| v.pub_key.value == key.to_base64())
            .unwrap();
        assert_eq!(in_genesis.address, key.address());
        assert!(book.addrs.iter().any(|a| a.addr.id == hex::encode([seed; 20])));
    }
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = testnets(&[("net1", 2, HOUR), ("net2", 2, HOUR)]);

    let genesis = {
        let store = open_store(dir.path(), config.clone());
        store.register_validator("net1", validator(1, "v1")).unwrap();
        store.register_validator("net1", validator(2, "v2")).unwrap();
        store.register_validator("net2", validator(3, "v3")).unwrap();
        store.get_genesis("net1").unwrap()
    };

    let store = open_store(dir.path(), config);
    assert_eq!(store.state("net1").unwrap(), ServerState::Serving);
    assert_eq!(store.get_genesis("net1").unwrap(), genesis);

    // Gathering registrations are written through as well
    assert_eq!(store.state("net2").unwrap(), ServerState::Gathering);
    assert_eq!(store.validator_count("net2").unwrap(), 1);
}

#[test]
fn test_record_is_stored_under_chain_id() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(SledBackend::open(dir.path()).unwrap());
    let store = TestnetStore::open(backend.clone(), testnets(&[("net1", 1, HOUR)])).unwrap();

    store.register_validator("net1", validator(1, "v1")).unwrap();

    let bytes = backend.get(b"net1").unwrap().unwrap();
    let record = TestnetRecord::from_bytes(&bytes).unwrap();
    assert!(record.is_serving());
    assert!(record.genesis.is_some());
    assert!(record.address_book.is_some());
}

#[test]
fn test_concurrent_registrations_serve_exactly_once() {
    const THREADS: u8 = 16;
    const QUORUM: u32 = 4;

    for _ in 0..20 {
        let dir = tempdir().unwrap();
        let store = Arc::new(open_store(dir.path(), testnets(&[("net1", QUORUM, HOUR)])));

        let handles: Vec<_> = (1..=THREADS)
            .map(|seed| {
                let store = store.clone();
                thread::spawn(move || {
                    store.global_sweep().unwrap();
                    store
                        .register_validator("net1", validator(seed, &format!("v{}", seed)))
                        .is_ok()
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, QUORUM as usize);

        let genesis = store.get_genesis("net1").unwrap().genesis;
        let book = store.get_address_book("net1").unwrap();
        assert_eq!(genesis.validators.len(), QUORUM as usize);
        assert_eq!(book.addrs.len(), QUORUM as usize);
        assert_eq!(store.validator_count("net1").unwrap(), QUORUM as usize);
    }
}
