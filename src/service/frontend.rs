//! HTTP surface of the coordinator
use super::{Coordinator, LoopService, Replica, SharedCoordinator};
use crate::{
    auction::{AuctionItem, BidDetails, ItemId, Listings, NewItem},
    config::Config,
    group::{InProcessGroup, MemberId, SharedGroupTransport},
};
use anyhow::{format_err, Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::{runtime::Runtime, sync::oneshot};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    pub item_id: ItemId,
}

pub fn router(coordinator: SharedCoordinator) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/items", get(get_listings).post(create_item))
        .route("/items/:id", get(get_spec))
        .route("/items/:id/bids", post(bid))
        .route("/items/:id/close", post(close_item))
        .route("/items/:id/non-existent", get(check_item_non_existent))
        .route("/clients/:id", get(check_client_id))
        .with_state(coordinator)
}

async fn create_item(
    State(coordinator): State<SharedCoordinator>,
    Json(listing): Json<NewItem>,
) -> Json<CreatedItem> {
    Json(CreatedItem {
        item_id: coordinator.create_item(listing).await,
    })
}

async fn get_listings(State(coordinator): State<SharedCoordinator>) -> Json<Listings> {
    Json(coordinator.get_listings().await)
}

async fn get_spec(
    State(coordinator): State<SharedCoordinator>,
    Path(item_id): Path<ItemId>,
) -> Json<Option<AuctionItem>> {
    Json(coordinator.get_spec(item_id).await)
}

async fn bid(
    State(coordinator): State<SharedCoordinator>,
    Path(item_id): Path<ItemId>,
    Json(bid): Json<BidDetails>,
) -> StatusCode {
    coordinator.bid(item_id, bid).await;
    StatusCode::NO_CONTENT
}

async fn close_item(
    State(coordinator): State<SharedCoordinator>,
    Path(item_id): Path<ItemId>,
) -> Json<Option<AuctionItem>> {
    Json(coordinator.close_item(item_id).await)
}

async fn check_item_non_existent(
    State(coordinator): State<SharedCoordinator>,
    Path(item_id): Path<ItemId>,
) -> Json<bool> {
    Json(coordinator.check_item_non_existent(item_id).await)
}

async fn check_client_id(
    State(coordinator): State<SharedCoordinator>,
    Path(client_id): Path<String>,
) -> Json<bool> {
    Json(coordinator.check_client_id(&client_id).await)
}

/// Start `count` replicas one after another, each syncing from the previous ones
pub async fn start_replicas(
    transport: &SharedGroupTransport,
    config: &Config,
    count: usize,
) -> Result<Vec<Arc<Replica>>> {
    let mut replicas = Vec::with_capacity(count);
    for n in 1..=count {
        let id = MemberId::new(format!("{}-replica-{n}", config.group));
        replicas.push(
            Replica::start(id, transport.clone(), config.dispatch_timeout)
                .await
                .context("failed to start replica")?,
        );
    }
    Ok(replicas)
}

async fn run_http_server(config: Config) -> Result<()> {
    let transport: SharedGroupTransport = InProcessGroup::new_shared(config.group.clone());
    let _replicas = start_replicas(&transport, &config, config.replicas).await?;
    let coordinator = Coordinator::new_shared(transport, &config);

    info!(addr = %config.bind_addr, group = %config.group, "coordinator listening");
    axum::Server::try_bind(&config.bind_addr)?
        .serve(router(coordinator).into_make_service())
        .await?;

    Ok(())
}

/// Runs the replicas, the coordinator and its HTTP server
pub struct Frontend {
    // cancels all tasks on drop
    _runtime: Runtime,
    server_rx: oneshot::Receiver<Result<()>>,
}

impl Frontend {
    pub fn new(config: Config) -> Result<Self> {
        let runtime = Runtime::new()?;

        let (tx, rx) = oneshot::channel();

        runtime.spawn(async move {
            let res = run_http_server(config)
                .await
                .context("Failed to run http server");
            // the receiver is gone only when we're shutting down
            let _ = tx.send(res);
        });

        Ok(Self {
            _runtime: runtime,
            server_rx: rx,
        })
    }
}

impl LoopService for Frontend {
    fn run_iteration(&mut self) -> Result<()> {
        // don't hog the cpu
        std::thread::sleep(std::time::Duration::from_millis(100));

        match self.server_rx.try_recv() {
            Ok(res) => res,
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(format_err!("http server died without leaving a response?!"))
            }
        }
    }
}
