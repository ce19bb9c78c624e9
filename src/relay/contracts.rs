// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement-layer contract interfaces.
//!
//! Minimal ABIs for the four contracts the relay talks to. The
//! `PackedOperation` layout is wire-critical: the bundler encodes it for
//! `handleOps` and the EntryPoint decodes it on-chain, so any field reorder
//! or type change is a compatibility break.

use alloy::sol;

sol! {
    /// Sponsored relay: the server submits on behalf of a sender whose
    /// signature the contract verifies before acting.
    #[sol(rpc)]
    interface IMessageRelay {
        /// Per-sender relay nonce, tracked independently of the account's
        /// own transaction nonce.
        function nonces(address sender) external view returns (uint256);

        /// Deliver `data` to `to` on behalf of `sender`. Reverts if
        /// `signature` does not recover to `sender`'s registered owner.
        function relayMessage(
            address sender,
            address to,
            bytes calldata data,
            uint256 nonce,
            bytes calldata signature
        ) external;
    }

    /// Account-abstraction entry point for batch settlement.
    #[sol(rpc)]
    interface IEntryPoint {
        struct PackedOperation {
            address sender;
            address target;
            bytes callData;
            uint256 nonce;
            bytes signature;
            address paymaster;
        }

        function nonces(address sender) external view returns (uint256);

        function handleOps(PackedOperation[] calldata ops) external;
    }

    /// Deterministic smart-account factory.
    #[sol(rpc)]
    interface ISimpleAccountFactory {
        event AccountCreated(address indexed account, address indexed owner);

        /// Counterfactual address for `owner`, valid before deployment.
        function getAddress(address owner) external view returns (address);

        function createAccount(address owner) external returns (address);
    }

    /// On-chain agent registry, scanned as the index fallback.
    #[sol(rpc)]
    interface IAgentIndex {
        struct AgentView {
            uint256 id;
            string name;
            address wallet;
            address admin;
            bool active;
        }

        function searchPaginated(string calldata query, uint256 offset, uint256 limit)
            external
            view
            returns (AgentView[] memory agents, uint256 total, bool hasMore);
    }
}
