// ABOUTME: Pool of named consensus/execution client endpoints with pluggable health probing
// ABOUTME: The default probe talks to the beacon node API and execution JSON-RPC over HTTP

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::error::ClientError;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    #[serde(default)]
    pub consensus_url: Option<String>,
    #[serde(default)]
    pub execution_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    name: String,
    consensus_url: Option<String>,
    execution_url: Option<String>,
}

impl Client {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn consensus_url(&self) -> Option<&str> {
        self.consensus_url.as_deref()
    }

    pub fn execution_url(&self) -> Option<&str> {
        self.execution_url.as_deref()
    }

    pub fn has_consensus(&self) -> bool {
        self.consensus_url.is_some()
    }

    pub fn has_execution(&self) -> bool {
        self.execution_url.is_some()
    }
}

/// Liveness check for a single client. Must be safe to call repeatedly and
/// concurrently for different clients.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, client: &Client) -> Result<bool, ClientError>;
}

pub struct RpcHealthProbe {
    http: reqwest::Client,
}

impl RpcHealthProbe {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::HttpClient)?;
        Ok(Self { http })
    }

    async fn check_consensus(&self, client: &Client, url: &str) -> Result<bool, ClientError> {
        let endpoint = format!("{}/eth/v1/node/health", url.trim_end_matches('/'));
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                client: client.name.clone(),
                source,
            })?;

        // 206 means the node is up but still syncing
        Ok(response.status().as_u16() == 200)
    }

    async fn check_execution(&self, client: &Client, url: &str) -> Result<bool, ClientError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_syncing",
            "params": [],
        });
        let response: serde_json::Value = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| ClientError::Request {
                client: client.name.clone(),
                source,
            })?
            .json()
            .await
            .map_err(|source| ClientError::Request {
                client: client.name.clone(),
                source,
            })?;

        match response.get("result") {
            Some(serde_json::Value::Bool(syncing)) => Ok(!syncing),
            Some(serde_json::Value::Object(_)) => Ok(false),
            _ => Err(ClientError::UnexpectedResponse {
                client: client.name.clone(),
                message: format!("eth_syncing returned {}", response),
            }),
        }
    }
}

#[async_trait]
impl HealthProbe for RpcHealthProbe {
    async fn check(&self, client: &Client) -> Result<bool, ClientError> {
        if let Some(url) = client.consensus_url() {
            if !self.check_consensus(client, url).await? {
                return Ok(false);
            }
        }
        if let Some(url) = client.execution_url() {
            if !self.check_execution(client, url).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

type ClientList = Arc<RwLock<Vec<Arc<Client>>>>;

pub struct ClientPool {
    clients: ClientList,
    probe: Arc<dyn HealthProbe>,
}

impl ClientPool {
    /// Create a pool probing clients over HTTP.
    pub fn new() -> Result<Self, ClientError> {
        let probe = RpcHealthProbe::new(DEFAULT_PROBE_TIMEOUT)?;
        Ok(Self::with_probe(Arc::new(probe)))
    }

    pub fn with_probe(probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            clients: Arc::new(RwLock::new(Vec::new())),
            probe,
        }
    }

    pub fn add_client(&self, config: ClientConfig) -> Result<Arc<Client>, ClientError> {
        if config.name.trim().is_empty() {
            return Err(ClientError::InvalidEndpoint {
                name: config.name,
                reason: "client name must not be empty".to_string(),
            });
        }
        if config.consensus_url.is_none() && config.execution_url.is_none() {
            return Err(ClientError::InvalidEndpoint {
                name: config.name,
                reason: "at least one of consensus_url or execution_url is required".to_string(),
            });
        }
        for url in [&config.consensus_url, &config.execution_url].into_iter().flatten() {
            validate_endpoint(&config.name, url)?;
        }

        let mut clients = self.clients.write();
        if clients.iter().any(|c| c.name == config.name) {
            return Err(ClientError::DuplicateName { name: config.name });
        }

        let client = Arc::new(Client {
            name: config.name,
            consensus_url: config.consensus_url,
            execution_url: config.execution_url,
        });
        info!("Added client to pool: {}", client.name);
        clients.push(Arc::clone(&client));
        Ok(client)
    }

    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.read().clone()
    }

    pub fn get_client(&self, name: &str) -> Option<Arc<Client>> {
        self.clients.read().iter().find(|c| c.name == name).cloned()
    }

    pub fn consensus_clients(&self) -> Vec<Arc<Client>> {
        self.clients
            .read()
            .iter()
            .filter(|c| c.has_consensus())
            .cloned()
            .collect()
    }

    pub fn execution_clients(&self) -> Vec<Arc<Client>> {
        self.execution_pool().clients()
    }

    /// Live view of the clients that expose an execution endpoint.
    pub fn execution_pool(&self) -> ExecutionPool {
        ExecutionPool {
            clients: Arc::clone(&self.clients),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn check_health(&self, client: &Client) -> Result<bool, ClientError> {
        let healthy = self.probe.check(client).await;
        debug!("Health check for {}: {:?}", client.name, healthy);
        healthy
    }
}

#[derive(Clone)]
pub struct ExecutionPool {
    clients: ClientList,
}

impl ExecutionPool {
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients
            .read()
            .iter()
            .filter(|c| c.has_execution())
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().iter().all(|c| !c.has_execution())
    }
}

fn validate_endpoint(name: &str, url: &str) -> Result<(), ClientError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ClientError::InvalidEndpoint {
        name: name.to_string(),
        reason: format!("{}: {}", url, e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ClientError::InvalidEndpoint {
            name: name.to_string(),
            reason: format!("unsupported scheme '{}' in {}", scheme, url),
        }),
    }
}
