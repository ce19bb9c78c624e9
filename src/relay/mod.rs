// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement-layer integration.
//!
//! This module provides functionality for:
//! - Smart-account resolution and lazy creation
//! - Operation building, hashing, and signing
//! - Sponsored and direct message submission
//! - Batch settlement through the EntryPoint with fee escalation
//! - Agent existence checks with an on-chain fallback

pub mod accounts;
pub mod bundler;
pub mod client;
pub mod contracts;
pub mod fees;
pub mod index;
pub mod operation;
pub mod submitter;

pub use accounts::{AccountDirectory, FactoryBackend};
pub use bundler::{BatchResult, BatchSubmitter, BundlerQueue};
pub use client::SettlementClient;
pub use fees::FeeStrategy;
pub use index::ExistenceIndex;
pub use operation::SignedOperation;
pub use submitter::{RelaySubmitter, SubmitOutcome, SubmitPath};
