//! Contract bindings used by the relay.

use alloy::sol;

sol! {
    /// EIP-2612 token surface read by the verifier and engine.
    #[derive(Debug)]
    interface IERC20Permit {
        function name() external view returns (string);
        function version() external view returns (string);
        function decimals() external view returns (uint8);
        function nonces(address owner) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    /// Facilitator entry point called by the relayer on behalf of the payer.
    #[derive(Debug)]
    interface IFacilitator {
        function processPayment(
            address payer,
            address paymentToken,
            uint256 paymentAmount,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }

    /// EIP-2612 typed-data struct.
    #[derive(Debug, PartialEq, Eq)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}
