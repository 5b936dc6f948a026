//! Liquidator contract binding.
//!
//! Turns liquidation parameters into [`QueuedTx`] values ready for the
//! transaction queue. Batch calls use the gas limit chosen by the caller;
//! single liquidations estimate gas live against a node and add a buffer.

pub mod bindings;

pub use bindings::ILiquidator;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use anyhow::Result;
use tracing::debug;

use crate::oracle::PostableData;
use crate::queue::QueuedTx;

/// Buffer applied to live gas estimates of single liquidations (+7%).
pub const SINGLE_LIQUIDATION_GAS_BUFFER_BPS: u64 = 700;

/// Apply the single-liquidation buffer to a raw estimate, rounding up.
pub fn buffered_gas_limit(estimate: u64) -> u64 {
    let scaled = estimate as u128 * (10_000 + SINGLE_LIQUIDATION_GAS_BUFFER_BPS as u128);
    scaled.div_ceil(10_000) as u64
}

/// Binding for the deployed liquidator contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidatorContract {
    /// Contract address
    pub address: Address,
}

impl LiquidatorContract {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Encode `liquidate(borrower, repay, seize, amount)`.
    pub fn encode_liquidate(
        &self,
        borrower: Address,
        repay_token: Address,
        seize_token: Address,
        amount: U256,
    ) -> Bytes {
        ILiquidator::liquidateCall {
            borrower,
            repayCToken: repay_token,
            seizeCToken: seize_token,
            amount,
        }
        .abi_encode()
        .into()
    }

    /// Single liquidation with a live gas estimate.
    ///
    /// The estimate is taken from `from` against `provider` and buffered by
    /// [`SINGLE_LIQUIDATION_GAS_BUFFER_BPS`]. Estimation failures propagate.
    pub async fn liquidate<P: Provider>(
        &self,
        provider: &P,
        from: Address,
        borrower: Address,
        repay_token: Address,
        seize_token: Address,
        amount: U256,
        gas_price: u128,
    ) -> Result<QueuedTx> {
        let input = self.encode_liquidate(borrower, repay_token, seize_token, amount);
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(self.address)
            .with_input(input.clone());

        let estimate = provider.estimate_gas(request).await?;
        let gas_limit = buffered_gas_limit(estimate);

        debug!(
            borrower = %borrower,
            estimate,
            gas_limit,
            "Estimated single liquidation gas"
        );

        Ok(QueuedTx::call(self.address, input, gas_price, gas_limit))
    }

    /// Batch liquidation without a price update.
    pub fn liquidate_many(
        &self,
        borrowers: &[Address],
        repay_tokens: &[Address],
        seize_tokens: &[Address],
        gas_price: u128,
        gas_limit: u64,
    ) -> QueuedTx {
        let input: Bytes = ILiquidator::liquidateManyCall {
            borrowers: borrowers.to_vec(),
            repayCTokens: repay_tokens.to_vec(),
            seizeCTokens: seize_tokens.to_vec(),
        }
        .abi_encode()
        .into();

        QueuedTx::call(self.address, input, gas_price, gas_limit)
    }

    /// Batch liquidation preceded by posting `prices` to the oracle.
    pub fn liquidate_many_with_price_update(
        &self,
        prices: &PostableData,
        borrowers: &[Address],
        repay_tokens: &[Address],
        seize_tokens: &[Address],
        gas_price: u128,
        gas_limit: u64,
    ) -> QueuedTx {
        let input: Bytes = ILiquidator::liquidateManyWithPriceUpdateCall {
            messages: prices.messages.clone(),
            signatures: prices.signatures.clone(),
            symbols: prices.symbols.clone(),
            borrowers: borrowers.to_vec(),
            repayCTokens: repay_tokens.to_vec(),
            seizeCTokens: seize_tokens.to_vec(),
        }
        .abi_encode()
        .into();

        QueuedTx::call(self.address, input, gas_price, gas_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> LiquidatorContract {
        LiquidatorContract::new(Address::repeat_byte(0x11))
    }

    #[test]
    fn test_buffered_gas_limit() {
        assert_eq!(buffered_gas_limit(100_000), 107_000);
        // 333 * 1.07 = 356.31 -> 357
        assert_eq!(buffered_gas_limit(333), 357);
        assert_eq!(buffered_gas_limit(0), 0);
    }

    #[test]
    fn test_liquidate_many_tx() {
        let borrowers = [Address::repeat_byte(1), Address::repeat_byte(2)];
        let repay = [Address::repeat_byte(3), Address::repeat_byte(3)];
        let seize = [Address::repeat_byte(4), Address::repeat_byte(5)];

        let tx = contract().liquidate_many(&borrowers, &repay, &seize, 42, 140_000);

        assert_eq!(tx.to, contract().address);
        assert_eq!(tx.gas_price, 42);
        assert_eq!(tx.gas_limit, 140_000);
        assert!(tx.value.is_zero());
        assert_eq!(&tx.input[..4], &ILiquidator::liquidateManyCall::SELECTOR);
    }

    #[test]
    fn test_liquidate_many_is_deterministic() {
        let borrowers = [Address::repeat_byte(1)];
        let repay = [Address::repeat_byte(3)];
        let seize = [Address::repeat_byte(4)];

        let a = contract().liquidate_many(&borrowers, &repay, &seize, 1, 120_000);
        let b = contract().liquidate_many(&borrowers, &repay, &seize, 1, 120_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_liquidate_many_with_price_update_tx() {
        let prices = PostableData::new(
            vec![Bytes::from(vec![1u8; 32])],
            vec![Bytes::from(vec![2u8; 65])],
            vec!["BTC".to_string()],
        );
        let tx = contract().liquidate_many_with_price_update(
            &prices,
            &[Address::repeat_byte(1)],
            &[Address::repeat_byte(3)],
            &[Address::repeat_byte(4)],
            7,
            420_000,
        );

        assert_eq!(tx.gas_limit, 420_000);
        assert_eq!(
            &tx.input[..4],
            &ILiquidator::liquidateManyWithPriceUpdateCall::SELECTOR
        );
    }

    #[test]
    fn test_encode_liquidate() {
        let input = contract().encode_liquidate(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(3),
            U256::from(5u64),
        );
        assert_eq!(&input[..4], &ILiquidator::liquidateCall::SELECTOR);
    }
}
