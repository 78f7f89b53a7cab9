//! HTTP control plane
//!
//! JSON over HTTP with permissive CORS and a request timeout. Every error
//! body is `{"success": false, "error": "..."}` with a conventional status
//! code. Handlers mutate chain state through the same writer lock as the
//! miner and the gossip dispatcher.

use crate::context::NodeContext;
use crate::dto::{BlockDetailDto, BlockSummaryDto, TransactionDto};
use crate::miner::mine_and_announce;
use crate::webmine::{verify_solution, WebChallenge};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use quantumcoin_core::transaction::new_transaction;
use quantumcoin_core::{CoreError, Hash256Ext, Transaction, Wallet, WalletStore};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match err {
            CoreError::InvalidAmount
            | CoreError::InvalidAddress(_)
            | CoreError::InvalidSignature
            | CoreError::EmptyInputs
            | CoreError::EmptyOutputs
            | CoreError::InvalidTxIdHex(_)
            | CoreError::DuplicateTransaction
            | CoreError::MinerAddressEmpty
            | CoreError::UnspendableInput
            | CoreError::Serialization(_) => StatusCode::BAD_REQUEST,
            CoreError::InsufficientFunds { .. }
            | CoreError::SupplyExhausted
            | CoreError::MiningEnded
            | CoreError::DoubleSpend
            | CoreError::MempoolFull => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

pub fn router(ctx: Arc<NodeContext>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/wallet/new", get(wallet_new).post(wallet_new))
        .route("/api/wallet/balance/:address", get(wallet_balance))
        .route("/api/tx/build", post(tx_build))
        .route("/api/tx/send", post(tx_send))
        .route("/api/tx/status", get(tx_status))
        .route("/api/tx/burn", post(tx_burn))
        .route("/api/mine", post(mine))
        .route("/api/dev/fastmine", post(fastmine))
        .route("/api/blocks", get(blocks))
        .route("/api/block", get(block_detail))
        .route("/api/mempool", get(mempool))
        .route("/api/mine/job", post(mine_job))
        .route("/api/mine/submit", post(mine_submit))
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Bind and serve until the shutdown future resolves
pub async fn serve<F>(ctx: Arc<NodeContext>, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "http server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(ctx): State<Arc<NodeContext>>) -> ApiResult {
    let chain = ctx.chain.read().await;
    Ok(Json(json!({
        "ok": true,
        "height": chain.best_height(),
        "time": chrono::Utc::now().to_rfc3339(),
        "httpPort": ctx.config.http_port,
    })))
}

async fn wallet_new(State(ctx): State<Arc<NodeContext>>) -> ApiResult {
    let path = ctx.wallet_path();
    let mut store = WalletStore::load(&path)?;
    let wallet = Wallet::new();
    store.insert(&wallet);
    store.save(&path)?;
    Ok(Json(json!({ "success": true, "address": wallet.address() })))
}

async fn wallet_balance(
    State(ctx): State<Arc<NodeContext>>,
    Path(address): Path<String>,
) -> ApiResult {
    let chain = ctx.chain.read().await;
    let balance = chain.balance(&address)?;
    let spendable = chain.spendable_balance(&address)?;
    Ok(Json(json!({
        "balance": balance,
        "spendable": spendable,
        "height": chain.best_height(),
    })))
}

#[derive(Deserialize)]
struct BuildTxRequest {
    from: String,
    to: String,
    amount: u64,
}

async fn tx_build(
    State(ctx): State<Arc<NodeContext>>,
    Json(req): Json<BuildTxRequest>,
) -> ApiResult {
    let chain = ctx.chain.read().await;
    let tx = new_transaction(&req.from, &req.to, req.amount, &chain)?;
    build_response(&tx)
}

#[derive(Deserialize)]
struct BurnTxRequest {
    from: String,
    amount: u64,
}

async fn tx_burn(
    State(ctx): State<Arc<NodeContext>>,
    Json(req): Json<BurnTxRequest>,
) -> ApiResult {
    let burn_address = ctx.config.burn_address.clone();
    if burn_address.is_empty() {
        return Err(ApiError::bad_request("no burn address configured"));
    }
    let chain = ctx.chain.read().await;
    let tx = new_transaction(&req.from, &burn_address, req.amount, &chain)?;
    build_response(&tx)
}

/// Unsigned transaction plus the per-input digests a client must sign
fn build_response(tx: &Transaction) -> ApiResult {
    let mut signing_hashes = Vec::with_capacity(tx.inputs.len());
    for index in 0..tx.inputs.len() {
        signing_hashes.push(hex::encode(tx.signing_hash(index)?));
    }
    Ok(Json(json!({
        "success": true,
        "tx": TransactionDto::from(tx),
        "signingHashes": signing_hashes,
    })))
}

async fn tx_send(
    State(ctx): State<Arc<NodeContext>>,
    Json(dto): Json<TransactionDto>,
) -> ApiResult {
    let tx = Transaction::try_from(dto)?;
    // the id is derived, never client-supplied
    if tx.id != tx.hash()?.to_vec() {
        return Err(ApiError::bad_request("transaction id does not match contents"));
    }
    let id = tx.id_hex();
    {
        let mut chain = ctx.chain.write().await;
        chain.add_transaction(tx.clone())?;
    }
    if let Err(e) = ctx.network.broadcast_transaction(&tx).await {
        tracing::warn!(error = %e, "transaction broadcast failed");
    }
    Ok(Json(json!({ "success": true, "id": id })))
}

#[derive(Deserialize)]
struct TxStatusQuery {
    id: String,
}

async fn tx_status(
    State(ctx): State<Arc<NodeContext>>,
    Query(query): Query<TxStatusQuery>,
) -> ApiResult {
    let id = hex::decode(&query.id).map_err(|_| CoreError::InvalidTxIdHex(query.id.clone()))?;
    let chain = ctx.chain.read().await;
    let (in_block, in_mempool) = chain.tx_status(&id);
    Ok(Json(json!({ "inBlock": in_block, "inMempool": in_mempool })))
}

#[derive(Deserialize)]
struct MineRequest {
    #[serde(default)]
    address: String,
}

fn resolve_miner(ctx: &NodeContext, requested: &str) -> Result<String, ApiError> {
    if !requested.trim().is_empty() {
        return Ok(requested.trim().to_string());
    }
    if !ctx.config.miner_address.is_empty() {
        return Ok(ctx.config.miner_address.clone());
    }
    Err(ApiError::bad_request("no miner address given or configured"))
}

async fn mine(State(ctx): State<Arc<NodeContext>>, Json(req): Json<MineRequest>) -> ApiResult {
    let address = resolve_miner(&ctx, &req.address)?;
    let block = mine_and_announce(&ctx, &address, ctx.config.default_difficulty_bits).await?;
    Ok(Json(json!({
        "success": true,
        "height": block.index,
        "hash": block.hash_hex(),
        "reward": block.transactions.first().map(|tx| tx.output_total()).unwrap_or(0),
    })))
}

#[derive(Deserialize)]
struct FastMineQuery {
    #[serde(default)]
    n: u32,
    #[serde(default)]
    address: String,
}

async fn fastmine(
    State(ctx): State<Arc<NodeContext>>,
    Query(query): Query<FastMineQuery>,
) -> ApiResult {
    let address = resolve_miner(&ctx, &query.address)?;
    let rounds = query.n.max(1);
    let mut mined = 0;
    for _ in 0..rounds {
        match mine_and_announce(&ctx, &address, ctx.config.default_difficulty_bits).await {
            Ok(_) => mined += 1,
            Err(e) if mined == 0 => return Err(e.into()),
            Err(_) => break,
        }
    }
    let height = ctx.chain.read().await.best_height();
    Ok(Json(json!({
        "success": true,
        "requested": rounds,
        "mined": mined,
        "height": height,
    })))
}

#[derive(Deserialize)]
struct BlocksQuery {
    #[serde(default)]
    limit: usize,
}

async fn blocks(
    State(ctx): State<Arc<NodeContext>>,
    Query(query): Query<BlocksQuery>,
) -> ApiResult {
    let limit = if query.limit == 0 { 10 } else { query.limit };
    let chain = ctx.chain.read().await;
    let summaries: Vec<BlockSummaryDto> = chain
        .blocks()
        .iter()
        .rev()
        .take(limit)
        .map(BlockSummaryDto::from)
        .collect();
    Ok(Json(json!({
        "success": true,
        "height": chain.best_height(),
        "blocks": summaries,
    })))
}

#[derive(Deserialize)]
struct BlockQuery {
    index: Option<u32>,
    hash: Option<String>,
}

async fn block_detail(
    State(ctx): State<Arc<NodeContext>>,
    Query(query): Query<BlockQuery>,
) -> ApiResult {
    let chain = ctx.chain.read().await;
    let block = match (query.index, &query.hash) {
        (Some(index), _) => chain.block_by_index(index),
        (None, Some(hash)) => {
            let hash = quantumcoin_core::Hash256::from_hex(hash)?;
            chain.block_by_hash(&hash)
        }
        (None, None) => return Err(ApiError::bad_request("index or hash required")),
    };
    let block = block.ok_or_else(|| ApiError::not_found("block not found"))?;
    Ok(Json(json!({
        "success": true,
        "block": BlockDetailDto::from(block),
    })))
}

async fn mempool(State(ctx): State<Arc<NodeContext>>) -> ApiResult {
    let chain = ctx.chain.read().await;
    let pending: Vec<TransactionDto> = chain
        .pending_transactions()
        .iter()
        .map(TransactionDto::from)
        .collect();
    Ok(Json(json!({
        "success": true,
        "count": pending.len(),
        "transactions": pending,
    })))
}

#[derive(Deserialize)]
struct MineJobRequest {
    address: String,
}

async fn mine_job(
    State(ctx): State<Arc<NodeContext>>,
    Json(req): Json<MineJobRequest>,
) -> ApiResult {
    let address = resolve_miner(&ctx, &req.address)?;
    let challenge = {
        let chain = ctx.chain.read().await;
        let tip = chain.tip()?;
        WebChallenge::issue(&tip.hash, tip.index, &address)
    };
    let response = json!({
        "success": true,
        "challenge": hex::encode(challenge.challenge),
        "difficulty": challenge.difficulty,
    });
    *ctx.webmine.lock().await = Some(challenge);
    Ok(Json(response))
}

#[derive(Deserialize)]
struct MineSubmitRequest {
    address: String,
    challenge: String,
    nonce: u32,
}

async fn mine_submit(
    State(ctx): State<Arc<NodeContext>>,
    Json(req): Json<MineSubmitRequest>,
) -> ApiResult {
    let submitted = quantumcoin_core::Hash256::from_hex(&req.challenge)
        .map_err(|_| ApiError::bad_request("invalid challenge hex"))?;

    let active = {
        let mut slot = ctx.webmine.lock().await;
        let Some(active) = slot.take() else {
            return Err(ApiError::bad_request("no active mining job"));
        };
        if active.expired() {
            return Err(ApiError::bad_request("mining job expired"));
        }
        if active.challenge != submitted || active.miner != req.address {
            *slot = Some(active);
            return Err(ApiError::bad_request("challenge mismatch"));
        }
        active
    };

    let (accepted, digest_hex) = verify_solution(&submitted, req.nonce, active.difficulty);
    if !accepted {
        // the job stays open for another attempt
        *ctx.webmine.lock().await = Some(active);
        return Err(ApiError::bad_request("solution below difficulty"));
    }

    // solved: the job is consumed, mint a block for the submitter
    let block = mine_and_announce(&ctx, &req.address, ctx.config.default_difficulty_bits).await?;
    Ok(Json(json!({
        "success": true,
        "accepted": true,
        "solution": digest_hex,
        "height": block.index,
        "blockHash": block.hash_hex(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use quantumcoin_core::{Blockchain, Config};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_ctx(dir: &TempDir) -> Arc<NodeContext> {
        let mut config = Config::default();
        config.default_difficulty_bits = 4;
        config.coinbase_maturity = 0;
        config.total_supply = 0;
        config.chain_file = dir.path().join("chain_data.dat").display().to_string();
        config.wallet_file = dir.path().join("wallet_data.json").display().to_string();
        config.bonus_file = dir.path().join("bonus_store.json").display().to_string();

        let chain = Blockchain::new(config.chain_params(), 0, 0, 0).unwrap();
        NodeContext::new(config, chain)
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        call(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(
        app: &Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        call(app, request).await
    }

    #[tokio::test]
    async fn health_reports_height() {
        let dir = TempDir::new().unwrap();
        let app = router(test_ctx(&dir));

        let (status, body) = get(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["height"], 0);
    }

    #[tokio::test]
    async fn wallet_new_and_balance() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let app = router(Arc::clone(&ctx));

        let (status, body) = post(&app, "/api/wallet/new", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let address = body["address"].as_str().unwrap().to_string();
        assert!(ctx.wallet_path().exists());

        let (status, body) = get(&app, &format!("/api/wallet/balance/{address}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 0);
        assert_eq!(body["spendable"], 0);

        let (status, _) = get(&app, "/api/wallet/balance/not-an-address").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mine_and_inspect_blocks() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let app = router(Arc::clone(&ctx));
        let miner = Wallet::new();

        let (status, body) = post(&app, "/api/mine", json!({ "address": miner.address() })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["height"], 1);

        let (status, body) = get(&app, "/api/blocks?limit=5").await;
        assert_eq!(status, StatusCode::OK);
        let blocks = body["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        // newest first
        assert_eq!(blocks[0]["index"], 1);
        assert_eq!(blocks[1]["index"], 0);

        let (status, body) = get(&app, "/api/block?index=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block"]["miner"], miner.address());

        let (status, _) = get(&app, "/api/block?index=99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(&app, "/api/block").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // the mined reward shows up and the chain file was persisted
        let (_, body) = get(&app, &format!("/api/wallet/balance/{}", miner.address())).await;
        assert!(body["balance"].as_u64().unwrap() > 0);
        assert!(ctx.chain_path().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tx_build_sign_send_status() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let app = router(Arc::clone(&ctx));
        let alice = Wallet::new();
        let bob = Wallet::new();

        let (status, _) = post(&app, "/api/mine", json!({ "address": alice.address() })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post(
            &app,
            "/api/tx/build",
            json!({ "from": alice.address(), "to": bob.address(), "amount": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["signingHashes"].as_array().unwrap().is_empty());

        // sign client-side and submit
        let dto: TransactionDto = serde_json::from_value(body["tx"].clone()).unwrap();
        let mut tx = Transaction::try_from(dto).unwrap();
        alice.sign_transaction(&mut tx).unwrap();
        let signed = TransactionDto::from(&tx);

        let (status, body) = post(&app, "/api/tx/send", serde_json::to_value(&signed).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = get(&app, &format!("/api/tx/status?id={id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inMempool"], true);
        assert_eq!(body["inBlock"], false);

        let (_, body) = get(&app, "/api/mempool").await;
        assert_eq!(body["count"], 1);

        // a second mine confirms it
        post(&app, "/api/mine", json!({ "address": alice.address() })).await;
        let (_, body) = get(&app, &format!("/api/tx/status?id={id}")).await;
        assert_eq!(body["inBlock"], true);
        assert_eq!(body["inMempool"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tx_send_rejects_tampered_id() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let app = router(Arc::clone(&ctx));
        let alice = Wallet::new();
        let bob = Wallet::new();

        post(&app, "/api/mine", json!({ "address": alice.address() })).await;
        let (_, body) = post(
            &app,
            "/api/tx/build",
            json!({ "from": alice.address(), "to": bob.address(), "amount": 10 }),
        )
        .await;

        let dto: TransactionDto = serde_json::from_value(body["tx"].clone()).unwrap();
        let mut tx = Transaction::try_from(dto).unwrap();
        alice.sign_transaction(&mut tx).unwrap();
        let mut signed = TransactionDto::from(&tx);
        // the informational amount is still covered by the derived id
        signed.amount += 1;

        let (status, _) = post(&app, "/api/tx/send", serde_json::to_value(&signed).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tx_status_rejects_bad_hex() {
        let dir = TempDir::new().unwrap();
        let app = router(test_ctx(&dir));
        let (status, _) = get(&app, "/api/tx/status?id=zz").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mine_job_and_mismatched_submit() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let app = router(Arc::clone(&ctx));
        let miner = Wallet::new();

        // no job yet
        let (status, _) = post(
            &app,
            "/api/mine/submit",
            json!({ "address": miner.address(), "challenge": "00".repeat(32), "nonce": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post(&app, "/api/mine/job", json!({ "address": miner.address() })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["challenge"].as_str().unwrap().len(), 64);

        // wrong challenge keeps the job active and is rejected
        let (status, _) = post(
            &app,
            "/api/mine/submit",
            json!({ "address": miner.address(), "challenge": "11".repeat(32), "nonce": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(ctx.webmine.lock().await.is_some());
    }
}
