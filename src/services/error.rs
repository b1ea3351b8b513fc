// ABOUTME: Error types for the shared collaborators handed to tasks
// ABOUTME: Covers client pool registration/probing, validator name inventories and wallets

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Client name already in use: {name}")]
    DuplicateName { name: String },

    #[error("Invalid endpoint for client '{name}': {reason}")]
    InvalidEndpoint { name: String, reason: String },

    #[error("Request to client '{client}' failed: {source}")]
    Request {
        client: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from client '{client}': {message}")]
    UnexpectedResponse { client: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NamesError {
    #[error("Invalid validator name inventory entry '{key}': {reason}")]
    InvalidInventory { key: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Invalid wallet address: {address}")]
    InvalidAddress { address: String },
}
