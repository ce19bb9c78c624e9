// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account directory: identity -> smart-account address.
//!
//! Resolution order: in-memory cache, counterfactual address with code
//! already deployed, then an on-chain creation call. The check-then-create
//! sequence is serialized per identity so two concurrent calls for the same
//! unseen identity never create two accounts.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::error::RelayError;

use super::client::SettlementClient;
use super::contracts::ISimpleAccountFactory;

/// Cached identity -> account mappings kept in memory.
const ACCOUNT_CACHE_SIZE: usize = 4096;

/// Settlement-side operations the directory needs. Split out so the
/// single-flight discipline can be exercised without a network.
pub trait AccountBackend {
    /// Deterministic pre-deployment address for `owner`.
    fn counterfactual(
        &self,
        owner: Address,
    ) -> impl Future<Output = Result<Address, RelayError>> + Send;

    /// Whether code is already deployed at `account`.
    fn is_deployed(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<bool, RelayError>> + Send;

    /// Deploy an account for `owner`. `predicted` is the counterfactual
    /// address, returned when the creation event is absent.
    fn create_account(
        &self,
        owner: Address,
        predicted: Address,
    ) -> impl Future<Output = Result<Address, RelayError>> + Send;
}

pub struct AccountDirectory<B> {
    backend: B,
    cache: Mutex<LruCache<Address, Address>>,
    // One lock per identity currently being resolved. Entries are removed
    // once the last resolver for that identity finishes, so the map only
    // ever holds in-flight keys.
    inflight: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl<B: AccountBackend> AccountDirectory<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(ACCOUNT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve (creating if necessary) the account address for `owner`.
    ///
    /// Idempotent: repeated and concurrent calls for the same identity
    /// observe the same address and at most one creation transaction.
    pub async fn ensure_account(&self, owner: Address) -> Result<Address, RelayError> {
        if let Some(account) = self.cache.lock().await.get(&owner).copied() {
            return Ok(account);
        }

        let key_lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(inflight.entry(owner).or_default())
        };

        let result = {
            let _guard = key_lock.lock().await;
            self.resolve_uncached(owner).await
        };

        // Last resolver out removes the map entry: one clone in the map plus
        // ours means no other caller holds this lock.
        drop(key_lock);
        let mut inflight = self.inflight.lock().await;
        if inflight
            .get(&owner)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            inflight.remove(&owner);
        }

        result
    }

    async fn resolve_uncached(&self, owner: Address) -> Result<Address, RelayError> {
        // A racing caller may have finished while we waited for the key lock.
        if let Some(account) = self.cache.lock().await.get(&owner).copied() {
            return Ok(account);
        }

        let predicted = self.backend.counterfactual(owner).await?;

        let account = if self.backend.is_deployed(predicted).await? {
            tracing::debug!(%owner, account = %predicted, "account already deployed");
            predicted
        } else {
            let created = self.backend.create_account(owner, predicted).await?;
            tracing::info!(%owner, account = %created, "created smart account");
            created
        };

        self.cache.lock().await.put(owner, account);
        Ok(account)
    }
}

/// Production backend over the SimpleAccountFactory contract.
///
/// When no factory is configured the identity acts as its own account:
/// the counterfactual address is the owner itself and deployment checks
/// short-circuit.
pub struct FactoryBackend {
    client: Arc<SettlementClient>,
    factory: Option<Address>,
    server_signer: Option<PrivateKeySigner>,
}

impl FactoryBackend {
    pub fn new(
        client: Arc<SettlementClient>,
        factory: Option<Address>,
        server_signer: Option<PrivateKeySigner>,
    ) -> Self {
        Self {
            client,
            factory,
            server_signer,
        }
    }
}

impl AccountBackend for FactoryBackend {
    fn counterfactual(
        &self,
        owner: Address,
    ) -> impl Future<Output = Result<Address, RelayError>> + Send {
        async move {
            let Some(factory) = self.factory else {
                return Ok(owner);
            };
            let contract = ISimpleAccountFactory::new(factory, self.client.provider().clone());
            contract
                .getAddress(owner)
                .call()
                .await
                .map_err(|e| RelayError::Rpc(format!("counterfactual query failed: {e}")))
        }
    }

    fn is_deployed(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<bool, RelayError>> + Send {
        async move {
            if self.factory.is_none() {
                return Ok(true);
            }
            self.client.code_exists(account).await
        }
    }

    fn create_account(
        &self,
        owner: Address,
        predicted: Address,
    ) -> impl Future<Output = Result<Address, RelayError>> + Send {
        async move {
            let factory = self.factory.ok_or_else(|| {
                RelayError::AccountCreationFailed("no account factory configured".into())
            })?;
            let signer = self.server_signer.clone().ok_or_else(|| {
                RelayError::AccountCreationFailed(
                    "no funded server key configured for account creation".into(),
                )
            })?;

            let provider = self.client.wallet_provider(signer);
            let contract = ISimpleAccountFactory::new(factory, provider);

            let pending = contract.createAccount(owner).send().await.map_err(|e| {
                RelayError::AccountCreationFailed(format!("creation submit failed: {e}"))
            })?;

            let receipt = self.client.confirm(pending).await.map_err(|e| match e {
                RelayError::SettlementTimeout => {
                    RelayError::AccountCreationFailed("creation confirmation timed out".into())
                }
                other => RelayError::AccountCreationFailed(other.to_string()),
            })?;

            if !receipt.status() {
                return Err(RelayError::AccountCreationFailed(format!(
                    "creation transaction reverted (tx {})",
                    receipt.transaction_hash
                )));
            }

            // Prefer the address the factory reports; fall back to the
            // counterfactual address when the event is absent.
            let created = receipt
                .inner
                .logs()
                .iter()
                .find_map(|log| {
                    log.log_decode::<ISimpleAccountFactory::AccountCreated>()
                        .ok()
                })
                .map(|event| event.inner.data.account)
                .unwrap_or(predicted);

            Ok(created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that deterministically maps owners to accounts and counts
    /// creation calls.
    struct FakeBackend {
        deployed: std::sync::Mutex<Vec<Address>>,
        creations: AtomicUsize,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                deployed: std::sync::Mutex::new(Vec::new()),
                creations: AtomicUsize::new(0),
            }
        }

        fn with_deployed(account: Address) -> Self {
            let backend = Self::new();
            backend.deployed.lock().unwrap().push(account);
            backend
        }

        fn predicted_for(owner: Address) -> Address {
            let mut bytes = owner.into_array();
            bytes[0] ^= 0xff;
            Address::from(bytes)
        }
    }

    impl AccountBackend for FakeBackend {
        fn counterfactual(
            &self,
            owner: Address,
        ) -> impl Future<Output = Result<Address, RelayError>> + Send {
            async move { Ok(Self::predicted_for(owner)) }
        }

        fn is_deployed(
            &self,
            account: Address,
        ) -> impl Future<Output = Result<bool, RelayError>> + Send {
            async move { Ok(self.deployed.lock().unwrap().contains(&account)) }
        }

        fn create_account(
            &self,
            _owner: Address,
            predicted: Address,
        ) -> impl Future<Output = Result<Address, RelayError>> + Send {
            async move {
                // Let a racing caller reach the key lock before we finish.
                tokio::task::yield_now().await;
                self.creations.fetch_add(1, Ordering::SeqCst);
                self.deployed.lock().unwrap().push(predicted);
                Ok(predicted)
            }
        }
    }

    #[tokio::test]
    async fn creates_once_and_caches() {
        let owner = Address::repeat_byte(0xaa);
        let directory = AccountDirectory::new(FakeBackend::new());

        let first = directory.ensure_account(owner).await.unwrap();
        let second = directory.ensure_account(owner).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, FakeBackend::predicted_for(owner));
        assert_eq!(directory.backend.creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_create_exactly_one_account() {
        let owner = Address::repeat_byte(0xbb);
        let directory = AccountDirectory::new(FakeBackend::new());

        let (a, b) = tokio::join!(
            directory.ensure_account(owner),
            directory.ensure_account(owner)
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a, b);
        assert_eq!(directory.backend.creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_deployed_account_skips_creation() {
        let owner = Address::repeat_byte(0xcc);
        let predicted = FakeBackend::predicted_for(owner);
        let directory = AccountDirectory::new(FakeBackend::with_deployed(predicted));

        let account = directory.ensure_account(owner).await.unwrap();

        assert_eq!(account, predicted);
        assert_eq!(directory.backend.creations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inflight_locks_are_released_per_identity() {
        // Identities are caller-mintable, so the lock map must not retain
        // an entry per identity ever seen.
        let directory = AccountDirectory::new(FakeBackend::new());

        for byte in 0u8..64 {
            directory
                .ensure_account(Address::repeat_byte(byte))
                .await
                .unwrap();
        }

        assert_eq!(directory.inflight.lock().await.len(), 0);
        assert_eq!(directory.backend.creations.load(Ordering::SeqCst), 64);
    }

    #[tokio::test]
    async fn concurrent_resolution_still_cleans_up_the_lock_map() {
        let owner = Address::repeat_byte(0xdd);
        let directory = AccountDirectory::new(FakeBackend::new());

        let (a, b) = tokio::join!(
            directory.ensure_account(owner),
            directory.ensure_account(owner)
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(directory.inflight.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn distinct_owners_get_distinct_accounts() {
        let directory = AccountDirectory::new(FakeBackend::new());

        let a = directory
            .ensure_account(Address::repeat_byte(0x11))
            .await
            .unwrap();
        let b = directory
            .ensure_account(Address::repeat_byte(0x22))
            .await
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(directory.backend.creations.load(Ordering::SeqCst), 2);
    }
}
