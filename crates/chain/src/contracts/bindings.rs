//! Liquidator contract interface.
//!
//! Only the three entry points the bidder calls are declared. Calldata is
//! encoded locally; nothing here talks to a node.

use alloy::sol;

sol! {
    /// Batch liquidator deployed by the operator.
    #[derive(Debug)]
    interface ILiquidator {
        /// Liquidate a single borrower, repaying `amount` of `repayCToken`.
        function liquidate(
            address borrower,
            address repayCToken,
            address seizeCToken,
            uint256 amount
        ) external;

        /// Liquidate every borrower with the contract's own sizing.
        function liquidateMany(
            address[] calldata borrowers,
            address[] calldata repayCTokens,
            address[] calldata seizeCTokens
        ) external;

        /// Post signed oracle prices, then liquidate every borrower.
        function liquidateManyWithPriceUpdate(
            bytes[] calldata messages,
            bytes[] calldata signatures,
            string[] calldata symbols,
            address[] calldata borrowers,
            address[] calldata repayCTokens,
            address[] calldata seizeCTokens
        ) external;
    }
}
