use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use ledger_core::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD},
    Balance, Block, ChainInfo, Ledger, LedgerConfig, MiningError, Transaction,
};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{Mutex, MutexGuard};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

mod constants;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = constants::DEFAULT_LISTEN)]
    listen: String,

    /// Leading zero hex digits required in a block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Amount credited to the miner of each block
    #[arg(long, default_value_t = DEFAULT_MINING_REWARD)]
    reward: u64,
}

/// The ledger is one critical section: every request, mining included,
/// holds the same lock for its whole duration. The lock is async so waiting
/// requests yield their runtime worker while a block is being mined.
#[derive(Clone)]
struct AppState {
    ledger: Arc<Mutex<Ledger>>,
    shutdown: Arc<AtomicBool>,
}

impl AppState {
    fn new(config: LedgerConfig) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(config))),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().await
    }
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Serialize, Debug)]
struct ErrorBody {
    error: String,
}

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
}

#[derive(Serialize, Debug)]
struct Health {
    status: &'static str,
}

#[derive(Serialize, Debug)]
struct Validity {
    valid: bool,
    reason: Option<String>,
}

#[derive(Serialize, Debug)]
struct BalanceOut {
    address: String,
    balance: Balance,
}

#[derive(Deserialize, Debug)]
struct TxIn {
    from: String,
    to: String,
    amount: u64,
}

#[derive(Serialize, Debug)]
struct TxOut {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx: Option<Transaction>,
}

#[derive(Deserialize, Debug)]
struct MineIn {
    miner: String,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn chain(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.ledger().await.chain().to_vec())
}

async fn chain_info(State(state): State<AppState>) -> Json<ChainInfo> {
    Json(state.ledger().await.chain_info())
}

async fn chain_valid(State(state): State<AppState>) -> Json<Validity> {
    let result = state.ledger().await.validate_chain();
    Json(Validity {
        valid: result.is_ok(),
        reason: result.err().map(|e| e.to_string()),
    })
}

async fn mempool(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.ledger().await.pending().to_vec())
}

async fn balance(State(state): State<AppState>, Path(address): Path<String>) -> Json<BalanceOut> {
    let balance = state.ledger().await.get_balance(&address);
    Json(BalanceOut { address, balance })
}

/// Rejections are reported in the body, not the status code.
async fn submit_tx(State(state): State<AppState>, Json(input): Json<TxIn>) -> Json<TxOut> {
    let tx = Transaction::new(input.from, input.to, input.amount);
    let result = state.ledger().await.submit_transaction(tx.clone());
    match result {
        Ok(()) => Json(TxOut {
            accepted: true,
            error: None,
            tx: Some(tx),
        }),
        Err(e) => Json(TxOut {
            accepted: false,
            error: Some(e.to_string()),
            tx: None,
        }),
    }
}

async fn mine(
    State(state): State<AppState>,
    Json(input): Json<MineIn>,
) -> Result<Json<Block>, ApiError> {
    if input.miner.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "miner address is empty"));
    }
    // the owned guard moves the critical section onto the blocking pool
    let mut ledger = state.ledger.clone().lock_owned().await;
    let shutdown = state.shutdown.clone();
    let result = tokio::task::spawn_blocking(move || {
        ledger
            .mine_pending_transactions_cancellable(&input.miner, &shutdown)
            .cloned()
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    // cancellation on shutdown is the only way mining fails
    result
        .map(Json)
        .map_err(|e: MiningError| api_error(StatusCode::SERVICE_UNAVAILABLE, e))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/chain", get(chain))
        .route("/chain/info", get(chain_info))
        .route("/chain/valid", get(chain_valid))
        .route("/mempool", get(mempool))
        .route("/balance/{address}", get(balance))
        .route("/tx", post(submit_tx))
        .route("/mine", post(mine))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let state = AppState::new(LedgerConfig::new(args.difficulty, args.reward));
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!(
        difficulty = args.difficulty,
        reward = args.reward,
        "ledger-node listening on http://{addr}"
    );
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            info!("shutting down; cancelling any in-flight mining");
            shutdown.store(true, Ordering::Relaxed);
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState::new(LedgerConfig::new(1, 100))
    }

    async fn mine_as(state: &AppState, miner: &str) -> Block {
        let Json(block) = mine(
            State(state.clone()),
            Json(MineIn {
                miner: miner.to_string(),
            }),
        )
        .await
        .unwrap();
        block
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(h) = health().await;
        assert_eq!(h.status, "ok");
    }

    #[tokio::test]
    async fn mine_then_transfer_then_query() {
        let state = test_state();
        let block = mine_as(&state, "Miner1").await;
        assert_eq!(block.index(), 1);

        let Json(out) = submit_tx(
            State(state.clone()),
            Json(TxIn {
                from: "Miner1".into(),
                to: "Alice".into(),
                amount: 30,
            }),
        )
        .await;
        assert!(out.accepted);
        assert!(out.error.is_none());

        let Json(pending) = mempool(State(state.clone())).await;
        assert_eq!(pending.len(), 1);

        mine_as(&state, "Miner2").await;
        let Json(b) = balance(State(state.clone()), Path("Alice".to_string())).await;
        assert_eq!(b.balance, 30);
        let Json(b) = balance(State(state.clone()), Path("Miner1".to_string())).await;
        assert_eq!(b.balance, 70);

        let Json(info) = chain_info(State(state.clone())).await;
        assert_eq!(info.blocks, 3);
        assert_eq!(info.pending_transactions, 0);
        assert!(info.is_valid);

        let Json(blocks) = chain(State(state)).await;
        assert_eq!(blocks.len(), 3);
    }

    #[tokio::test]
    async fn overspend_is_reported_not_failed() {
        let state = test_state();
        let Json(out) = submit_tx(
            State(state.clone()),
            Json(TxIn {
                from: "Alice".into(),
                to: "Bob".into(),
                amount: 1000,
            }),
        )
        .await;
        assert!(!out.accepted);
        assert!(out.error.unwrap().contains("insufficient balance"));
        assert!(out.tx.is_none());
        let Json(pending) = mempool(State(state)).await;
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn chain_validity_endpoint() {
        let state = test_state();
        mine_as(&state, "Miner1").await;
        let Json(v) = chain_valid(State(state)).await;
        assert!(v.valid);
        assert!(v.reason.is_none());
    }

    #[tokio::test]
    async fn empty_miner_is_bad_request() {
        let state = test_state();
        let err = mine(
            State(state),
            Json(MineIn {
                miner: "  ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn shutdown_cancels_mining() {
        let state = AppState::new(LedgerConfig::new(64, 100));
        state.shutdown.store(true, Ordering::Relaxed);
        let err = mine(
            State(state.clone()),
            Json(MineIn {
                miner: "Miner1".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        let Json(info) = chain_info(State(state)).await;
        assert_eq!(info.blocks, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_wait_without_stalling_the_runtime_while_mining() {
        let state = AppState::new(LedgerConfig::new(64, 100));
        let miner = tokio::spawn(mine(
            State(state.clone()),
            Json(MineIn {
                miner: "Miner1".to_string(),
            }),
        ));
        // let the miner take the lock first
        while state.ledger.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }
        let readers: Vec<_> = (0..2)
            .map(|_| tokio::spawn(chain_info(State(state.clone()))))
            .collect();

        let Json(h) = tokio::time::timeout(Duration::from_secs(2), health())
            .await
            .expect("health must answer while a block is being mined");
        assert_eq!(h.status, "ok");
        let waiting = tokio::time::timeout(
            Duration::from_millis(100),
            chain_info(State(state.clone())),
        )
        .await;
        assert!(waiting.is_err(), "reads queue behind the mining lock");

        state.shutdown.store(true, Ordering::Relaxed);
        let err = miner.await.unwrap().unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        for reader in readers {
            let Json(info) = reader.await.unwrap();
            assert_eq!(info.blocks, 1);
        }
    }

    #[test]
    fn router_builds() {
        let _ = router(test_state());
    }
}
