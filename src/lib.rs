// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Agent Relay - Meta-Transaction Relay and Bundler Service
//!
//! This crate provides a gasless messaging relay for on-chain agents: callers
//! authenticate with a secret (private key, mnemonic, or passphrase), and the
//! server settles their messages on an EVM chain either through a sponsored
//! meta-transaction relay or directly from the caller's own funds. A bundler
//! queue aggregates pre-signed operations into single EntryPoint batches.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `secrets` - Secret classification and key derivation
//! - `relay` - Settlement: accounts, fees, submission paths, bundling
//! - `models` - JSON request/response types

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod secrets;
pub mod state;
