// ABOUTME: Wallet manager handing out shared per-address wallets to tasks
// ABOUTME: Tracks a local nonce per wallet on top of the execution client subset

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::clients::ExecutionPool;
use super::error::WalletError;

#[derive(Debug)]
pub struct Wallet {
    address: String,
    nonce: AtomicU64,
}

impl Wallet {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn nonce(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    /// Reserve the next nonce for a transaction.
    pub fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }
}

pub struct WalletManager {
    execution_pool: ExecutionPool,
    wallets: Mutex<HashMap<String, Arc<Wallet>>>,
}

impl WalletManager {
    pub fn new(execution_pool: ExecutionPool) -> Self {
        Self {
            execution_pool,
            wallets: Mutex::new(HashMap::new()),
        }
    }

    pub fn execution_pool(&self) -> &ExecutionPool {
        &self.execution_pool
    }

    /// Get the shared wallet for `address`, creating it on first use.
    pub fn wallet(&self, address: &str) -> Result<Arc<Wallet>, WalletError> {
        let normalized = normalize_address(address)?;
        let mut wallets = self.wallets.lock();
        let wallet = wallets.entry(normalized.clone()).or_insert_with(|| {
            Arc::new(Wallet {
                address: normalized,
                nonce: AtomicU64::new(0),
            })
        });
        Ok(Arc::clone(wallet))
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.lock().len()
    }
}

fn normalize_address(address: &str) -> Result<String, WalletError> {
    let invalid = || WalletError::InvalidAddress {
        address: address.to_string(),
    };
    let hex = address.strip_prefix("0x").ok_or_else(invalid)?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}
