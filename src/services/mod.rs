// ABOUTME: Shared collaborators bundle passed to every task
// ABOUTME: Groups the client pool, wallet manager and validator name registry

pub mod clients;
pub mod error;
pub mod names;
pub mod wallet;

pub use clients::{Client, ClientConfig, ClientPool, ExecutionPool, HealthProbe, RpcHealthProbe};
pub use error::{ClientError, NamesError, WalletError};
pub use names::{NamesConfig, ValidatorNames};
pub use wallet::{Wallet, WalletManager};

use std::sync::Arc;

/// Immutable handle to the collaborators shared by all tasks of a run.
///
/// Tasks may use the resources behind the handle; the handle itself has no
/// mutating API.
#[derive(Clone)]
pub struct ServicesProvider {
    client_pool: Arc<ClientPool>,
    wallet_manager: Arc<WalletManager>,
    validator_names: Arc<ValidatorNames>,
}

impl ServicesProvider {
    pub fn new(
        client_pool: Arc<ClientPool>,
        wallet_manager: Arc<WalletManager>,
        validator_names: Arc<ValidatorNames>,
    ) -> Self {
        Self {
            client_pool,
            wallet_manager,
            validator_names,
        }
    }

    /// Build the wallet manager from the pool's execution subset.
    pub fn from_pool(client_pool: Arc<ClientPool>, validator_names: ValidatorNames) -> Self {
        let wallet_manager = Arc::new(WalletManager::new(client_pool.execution_pool()));
        Self::new(client_pool, wallet_manager, Arc::new(validator_names))
    }

    pub fn client_pool(&self) -> &ClientPool {
        &self.client_pool
    }

    pub fn wallet_manager(&self) -> &WalletManager {
        &self.wallet_manager
    }

    pub fn validator_names(&self) -> &ValidatorNames {
        &self.validator_names
    }
}

impl std::fmt::Debug for ServicesProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesProvider")
            .field("clients", &self.client_pool.len())
            .field("validator_name_ranges", &self.validator_names.len())
            .finish()
    }
}
