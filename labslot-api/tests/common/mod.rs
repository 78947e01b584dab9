//! Shared test harness: an in-process labslot-api server on a free port.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use labslot_api::audit::AuditLogger;
use labslot_api::rest::{AppState, create_router};
use labslot_api::seed::{parse_seed, seed_resources};
use labslot_api::{LocalStore, StoreConfig};

/// Resources registered in every test server.
pub const SEED: &str = r#"[
    {"id": "R1", "name": "Router 1", "ip_address": "10.0.0.1", "ssh_port": 22, "web_port": 443},
    {"id": "R2", "name": "Switch 2", "ip_address": "10.0.0.2", "ssh_port": 22}
]"#;

pub struct TestServer {
    pub client: reqwest::Client,
    pub store: Arc<LocalStore>,
    addr: String,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Arc::new(LocalStore::in_memory(
            StoreConfig::default(),
            Arc::new(AuditLogger::new_noop()),
        ));
        seed_resources(store.as_ref(), parse_seed(SEED).unwrap())
            .await
            .unwrap();

        let app_state = Arc::new(AppState {
            store: store.clone(),
        });
        let router = create_router(app_state);

        let port = portpicker::pick_unused_port().expect("no free port");
        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            client: reqwest::Client::new(),
            store,
            addr,
            shutdown_tx,
            handle,
        }
    }

    /// Base URL of the versioned API.
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Server root, for routes outside `/v1`.
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .unwrap()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        // Open event streams keep the server alive until their next write
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}
