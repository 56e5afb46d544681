//! RPC Endpoints for the Testnet Director
//!
//! Provides HTTP endpoints for:
//! - Validator registration
//! - Genesis and address book download
//! - Testnet status

use crate::error::{DirectorError, DirectorResult};
use crate::state::StateMachine;
use crate::store::{AddrBook, ResultGenesis, ValidatorInfo};
use crate::types::{NetAddress, PubKeyEd25519, ServerState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// RPC Server State
pub struct RpcState {
    pub machine: Arc<StateMachine>,
}

/// Director RPC Server
pub struct DirectorRpc {
    state: Arc<RpcState>,
}

impl DirectorRpc {
    pub fn new(machine: Arc<StateMachine>) -> Self {
        Self {
            state: Arc::new(RpcState { machine }),
        }
    }

    /// Create the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/register", get(register))
            .route("/genesis", get(genesis))
            .route("/addrbook", get(addrbook))
            .route("/status", get(status))
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve(
        &self,
        listener: tokio::net::TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        info!("Director RPC server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub chain_id: String,
    pub name: String,
    /// base64 ed25519 public key
    pub pub_key: String,
    /// `ID@IP:PORT`
    pub net_address: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    pub code: u32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub chain_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub chain_id: String,
    pub state: ServerState,
    pub validators: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error wrapper that renders a `DirectorError` as an HTTP response
pub struct ApiError(DirectorError);

impl From<DirectorError> for ApiError {
    fn from(err: DirectorError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            DirectorError::UnregisteredTestnet(_)
            | DirectorError::NoGenesis(_)
            | DirectorError::NoAddressBook(_) => StatusCode::NOT_FOUND,
            DirectorError::NotAcceptingRegistrations(_) => StatusCode::CONFLICT,
            DirectorError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            DirectorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DirectorError::Persistence(_)
            | DirectorError::Serialization(_)
            | DirectorError::Config(_)
            | DirectorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                kind: self.0.kind().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Check the raw registration parameters and build the validator entry
pub fn validate_registration(query: &RegisterQuery) -> DirectorResult<ValidatorInfo> {
    if query.chain_id.is_empty() {
        return Err(DirectorError::InvalidInput("empty chain ID".to_string()));
    }
    PubKeyEd25519::from_base64(&query.pub_key)?;
    let net_address: NetAddress = query.net_address.parse()?;
    net_address.validate()?;

    Ok(ValidatorInfo::new(
        net_address,
        query.name.clone(),
        query.pub_key.clone(),
    ))
}

// ==================== Handlers ====================

/// Run a store call on the blocking pool; the registry lock can be held across a disk flush
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> DirectorResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DirectorError::Internal(format!("store task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn register(
    State(state): State<Arc<RpcState>>,
    Query(query): Query<RegisterQuery>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let validator = validate_registration(&query).inspect_err(|e| {
        warn!(chain_id = %query.chain_id, error = %e, "Rejected registration");
    })?;

    let machine = state.machine.clone();
    let chain_id = query.chain_id.clone();
    blocking(move || machine.register_validator(&chain_id, validator)).await?;

    info!(chain_id = %query.chain_id, name = %query.name, "Validator registered");
    Ok(Json(RegisterResponse {
        code: 0,
        message: "Registered".to_string(),
    }))
}

async fn genesis(
    State(state): State<Arc<RpcState>>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ResultGenesis>, ApiError> {
    let machine = state.machine.clone();
    let genesis = blocking(move || machine.get_genesis(&query.chain_id)).await?;
    Ok(Json(genesis))
}

async fn addrbook(
    State(state): State<Arc<RpcState>>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<AddrBook>, ApiError> {
    let machine = state.machine.clone();
    let book = blocking(move || machine.get_address_book(&query.chain_id)).await?;
    Ok(Json(book))
}

async fn status(
    State(state): State<Arc<RpcState>>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let machine = state.machine.clone();
    blocking(move || {
        let store = machine.store();
        Ok(StatusResponse {
            state: store.state(&query.chain_id)?,
            validators: store.validator_count(&query.chain_id)?,
            chain_id: query.chain_id,
        })
    })
    .await
    .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pub_key: &str, net_address: &str) -> RegisterQuery {
        RegisterQuery {
            chain_id: "net1".to_string(),
            name: "alice".to_string(),
            pub_key: pub_key.to_string(),
            net_address: net_address.to_string(),
        }
    }

    #[test]
    fn test_validate_registration() {
        let key = PubKeyEd25519([1; 32]).to_base64();
        let addr = format!("{}@10.0.0.1:26656", hex::encode([1u8; 20]));

        let validator = validate_registration(&query(&key, &addr)).unwrap();
        assert_eq!(validator.name, "alice");
        assert_eq!(validator.pub_key, key);
        assert_eq!(validator.net_address.port, 26656);
    }

    #[test]
    fn test_validate_registration_rejects_bad_input() {
        let key = PubKeyEd25519([1; 32]).to_base64();
        let addr = format!("{}@10.0.0.1:26656", hex::encode([1u8; 20]));

        let short_key = PubKeyEd25519([1; 32]).to_base64()[..20].to_string();
        assert!(matches!(
            validate_registration(&query(&short_key, &addr)),
            Err(DirectorError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_registration(&query(&key, "10.0.0.1:26656")),
            Err(DirectorError::InvalidInput(_))
        ));
        let unspecified = format!("{}@0.0.0.0:26656", hex::encode([1u8; 20]));
        assert!(validate_registration(&query(&key, &unspecified)).is_err());

        let mut empty_chain = query(&key, &addr);
        empty_chain.chain_id = String::new();
        assert!(validate_registration(&empty_chain).is_err());
    }

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (DirectorError::UnregisteredTestnet("x".into()), StatusCode::NOT_FOUND),
            (
                DirectorError::NotAcceptingRegistrations("x".into()),
                StatusCode::CONFLICT,
            ),
            (DirectorError::NotReady("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (DirectorError::NoGenesis("x".into()), StatusCode::NOT_FOUND),
            (DirectorError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                DirectorError::Persistence("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status_code(), expected);
        }
    }
}
