//! Transaction signer and broadcaster.
//! Uses Alloy providers for type-safe RPC interactions.
//!
//! The sender does not wait for receipts: the queue decides when a slot's
//! nonce has been consumed by polling the account nonce.

use crate::queue::QueuedTx;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Local nonce allocator.
///
/// Nonces are handed out once per queue slot; replacements reuse the slot's
/// nonce and never call [`NonceManager::reserve`].
#[derive(Debug)]
pub struct NonceManager {
    next: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            next: AtomicU64::new(initial_nonce),
        }
    }

    /// Reserve the next nonce for a new slot.
    #[inline]
    pub fn reserve(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Next nonce that would be reserved.
    #[inline]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Move forward to the chain nonce if the chain is ahead.
    pub fn catch_up(&self, chain_nonce: u64) {
        self.next.fetch_max(chain_nonce, Ordering::SeqCst);
    }
}

/// Signs and broadcasts legacy transactions at an explicit nonce.
pub struct TransactionSender {
    /// RPC URL for sending transactions
    rpc_url: String,
    /// Signer wallet
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    /// Chain ID
    chain_id: u64,
    /// Local nonce allocator
    nonce_manager: NonceManager,
}

impl TransactionSender {
    /// Create a sender from a private key (with or without `0x`).
    ///
    /// Fetches the pending nonce once so later slots never need an RPC call
    /// to pick a nonce.
    pub async fn new(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self> {
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse()?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let initial_nonce = provider.get_transaction_count(address).pending().await?;

        info!(
            address = %address,
            chain_id,
            initial_nonce,
            "Transaction sender initialized"
        );

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            wallet,
            address,
            chain_id,
            nonce_manager: NonceManager::new(initial_nonce),
        })
    }

    /// Reserve a nonce for a new queue slot.
    pub fn reserve_nonce(&self) -> u64 {
        self.nonce_manager.reserve()
    }

    /// Sign and broadcast `tx` at `nonce`. Returns the transaction hash.
    pub async fn broadcast(&self, tx: &QueuedTx, nonce: u64) -> Result<B256> {
        let start = Instant::now();

        let request = TransactionRequest::default()
            .with_from(self.address)
            .with_to(tx.to)
            .with_input(tx.input.clone())
            .with_value(tx.value)
            .with_nonce(nonce)
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(tx.gas_price)
            .with_chain_id(self.chain_id);

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);

        let pending = provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();

        info!(
            tx_hash = %tx_hash,
            nonce,
            to = %tx.to,
            gas_limit = tx.gas_limit,
            gas_price_gwei = tx.gas_price / crate::gas::GWEI,
            calldata_len = tx.input.len(),
            submit_ms = start.elapsed().as_millis(),
            "Transaction broadcast"
        );

        Ok(tx_hash)
    }

    /// Latest confirmed nonce of the sender account.
    pub async fn confirmed_nonce(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let nonce = provider.get_transaction_count(self.address).latest().await?;
        self.nonce_manager.catch_up(nonce);
        debug!(nonce, "Confirmed nonce fetched");
        Ok(nonce)
    }

    /// Next nonce a new slot would use.
    pub fn next_nonce(&self) -> u64 {
        self.nonce_manager.peek()
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_manager() {
        let manager = NonceManager::new(10);

        assert_eq!(manager.peek(), 10);
        assert_eq!(manager.reserve(), 10);
        assert_eq!(manager.reserve(), 11);
        assert_eq!(manager.peek(), 12);

        // Chain ahead: jump forward
        manager.catch_up(15);
        assert_eq!(manager.peek(), 15);

        // Chain behind: never move back
        manager.catch_up(3);
        assert_eq!(manager.peek(), 15);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_sender_creation() {
        // Test private key (DO NOT USE IN PRODUCTION)
        let private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let sender = TransactionSender::new(private_key, "https://eth.llamarpc.com", 1)
            .await
            .unwrap();

        assert_eq!(
            format!("{:?}", sender.address).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
