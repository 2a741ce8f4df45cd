// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! A stateless HTTP front-end implementing the RFC 6962 v1 client API on top
//! of a generic append-only Merkle log backend.
//!
//! The front-end validates submitted certificate chains against each log
//! instance's accepted roots, signs SCTs and STHs with the instance key, and
//! translates every public request into deadline-bearing backend RPCs. All
//! per-request state is request-local; everything shared is read-only after
//! startup.

pub mod backend;
pub mod config;
pub mod handlers;
pub mod instance;
pub mod keys;
pub mod sign;
pub mod util;
