//! API Server Module
//!
//! This module implements a JSON-RPC server for the coordinator service.
//! It accepts rollup transactions, validates them and adds them to the pending
//! pool, and exposes flush and status controls of the rollup pipeline.

use crate::{
    AssetId, BridgeCallData, Commitment, PendingTx, TxId, TxKind, ValidationError,
    batch::{PipelineControl, PipelineStatus},
    config::ApiConfig,
    pool::PendingPool,
    registry::{RollupRecord, RollupRegistry},
    validation::Validator,
};
use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state that is accessible across all request handlers
///
/// - `validator`: Validates incoming transactions
/// - `pool`: Stores pending transactions waiting to be rolled up
/// - `control`: Flush requests and status of the rollup pipeline
/// - `registry`: History of published rollups
#[derive(Clone)]
pub struct AppState {
    validator: Arc<Validator>,
    pool: Arc<PendingPool>,
    control: Arc<PipelineControl>,
    registry: Arc<RollupRegistry>,
}

impl AppState {
    pub fn new(
        pool: Arc<PendingPool>,
        control: Arc<PipelineControl>,
        registry: Arc<RollupRegistry>,
    ) -> Self {
        Self {
            validator: Arc::new(Validator::new(pool.clone())),
            pool,
            control,
            registry,
        }
    }
}

/// The main API server struct
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Listen address
    /// * `state` - Components shared with the rollup pipeline
    pub fn new(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Router with a single POST endpoint at "/" handling JSON-RPC requests
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.state.clone())
    }

    /// Starts the API server and begins listening for incoming requests
    ///
    /// # Returns
    /// `Ok(())` once the server shuts down, or an error if binding fails
    pub async fn start(self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` will be populated, but not both.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

/// JSON-RPC error object
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success<T: Serialize>(id: Value, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self {
                jsonrpc: "2.0".to_string(),
                result: Some(result),
                error: None,
                id,
            },
            Err(e) => Self::failure(id, -32603, format!("Internal error: {}", e)),
        }
    }

    fn failure(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

/// Transaction as submitted by a client
///
/// The creation time is assigned on arrival.
#[derive(Debug, Deserialize)]
struct TxSubmission {
    id: TxId,
    kind: TxKind,
    fee_asset_id: AssetId,
    #[serde(default)]
    declared_gas: u64,
    #[serde(default)]
    bridge_call_data: Option<BridgeCallData>,
    output_commitment: Commitment,
    #[serde(default)]
    consumed_commitment: Option<Commitment>,
    #[serde(default)]
    second_class: bool,
}

impl From<TxSubmission> for PendingTx {
    fn from(submission: TxSubmission) -> Self {
        PendingTx {
            id: submission.id,
            kind: submission.kind,
            created: Utc::now(),
            fee_asset_id: submission.fee_asset_id,
            declared_gas: submission.declared_gas,
            bridge_call_data: submission.bridge_call_data,
            output_commitment: submission.output_commitment,
            consumed_commitment: submission.consumed_commitment,
            second_class: submission.second_class,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum SubmissionStatus {
    Accepted,
    Rejected { reason: String },
}

/// Immediate feedback on a submission
#[derive(Debug, Serialize)]
struct SubmissionReceipt {
    tx_id: TxId,
    #[serde(flatten)]
    status: SubmissionStatus,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct RollupStatus {
    pipeline: PipelineStatus,
    rollups_recorded: u64,
    latest_rollup: Option<RollupRecord>,
}

/// Main RPC request handler
///
/// Routes the request to the appropriate handler based on the method name.
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    info!("Received RPC request: {}", request.method);

    let response = match request.method.as_str() {
        "submitTransaction" => handle_submit_transaction(state, request).await,
        "flushRollup" => {
            state.control.request_flush();
            info!("Rollup flush requested");
            JsonRpcResponse::success(request.id, true)
        }
        "rollupStatus" => handle_rollup_status(state, request).await,
        _ => JsonRpcResponse::failure(request.id, -32601, "Method not found".to_string()),
    };
    Json(response)
}

/// Handles the "submitTransaction" RPC method
///
/// Valid transactions go to the pending pool; invalid ones are answered with
/// a rejected receipt carrying the reason.
async fn handle_submit_transaction(state: AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let submission: TxSubmission = match serde_json::from_value(request.params) {
        Ok(submission) => submission,
        Err(e) => {
            error!("Failed to deserialize transaction: {}", e);
            return JsonRpcResponse::failure(request.id, -32602, format!("Invalid params: {}", e));
        }
    };
    let tx = PendingTx::from(submission);
    let tx_id = tx.id;

    let status = match state.validator.validate(&tx).await {
        Ok(()) => {
            if state.pool.add(tx).await {
                info!("Transaction {:?} added to pool", tx_id);
                SubmissionStatus::Accepted
            } else {
                SubmissionStatus::Rejected {
                    reason: ValidationError::DuplicateTx { id: tx_id }.to_string(),
                }
            }
        }
        Err(validation_error) => {
            warn!("Transaction {:?} validation failed: {}", tx_id, validation_error);
            SubmissionStatus::Rejected {
                reason: validation_error.to_string(),
            }
        }
    };

    JsonRpcResponse::success(
        request.id,
        SubmissionReceipt {
            tx_id,
            status,
            timestamp: Utc::now().timestamp(),
        },
    )
}

async fn handle_rollup_status(state: AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let registry = async {
        Ok::<_, anyhow::Error>((state.registry.count().await?, state.registry.latest().await?))
    };
    match registry.await {
        Ok((rollups_recorded, latest_rollup)) => JsonRpcResponse::success(
            request.id,
            RollupStatus {
                pipeline: state.control.status().await,
                rollups_recorded,
                latest_rollup,
            },
        ),
        Err(e) => {
            error!("Failed to read rollup registry: {:?}", e);
            JsonRpcResponse::failure(request.id, -32603, format!("Internal error: {}", e))
        }
    }
}
