//! Testnet Director
//!
//! Bootstraps test networks: validators register against a chain ID, and once
//! enough of them signed up (or the testnet's timeout passed) the director
//! freezes the network's genesis document and seed address book and serves them.
//!
//! ## Module Structure
//!
//! - `store/`: testnet records, genesis and address book generation, persistence
//! - `state/`: timeout ticker and the state machine driving periodic sweeps
//! - `rpc`: HTTP endpoints (`/register`, `/genesis`, `/addrbook`, `/status`)
//! - `node`: wiring of database, store, state machine and RPC server
//! - `config`: TOML configuration
//! - `types`: chain-level types (network addresses, public keys, lifecycle state)

/// Error types
pub mod error;

/// TOML configuration
pub mod config;

/// Network addresses, public keys, lifecycle state
pub mod types;

/// Testnet records and persistence
pub mod store;

/// Timeout ticker and state machine
pub mod state;

/// HTTP endpoints
pub mod rpc;

/// Process wiring
pub mod node;

pub mod version;

pub use config::{DirectorConfig, LogFormat, RpcConfig, TestnetConfig};
pub use error::{DirectorError, DirectorResult};
pub use node::Node;
pub use rpc::DirectorRpc;
pub use state::{MachineMessage, StateMachine, TimeoutInfo, TimeoutTicker};
pub use store::{
    AddrBook, GenesisDoc, KnownAddress, KvBackend, MemoryBackend, ResultGenesis, SledBackend,
    TestnetRecord, TestnetStore, ValidatorInfo,
};
pub use types::{NetAddress, PubKeyEd25519, ServerState};
