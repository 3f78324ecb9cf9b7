// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Persistent data store backends for `flagcore`'s lazy-load data
//! system.
//!
//! Split out of the core `flagcore` crate the way `hdds-persistence`
//! is split out of `hdds`: the core crate defines the trait its
//! evaluator and data sources depend on
//! ([`flagcore::data_source::LazyLoadPersistentStore`]), and this
//! crate supplies concrete backends without pulling a storage stack
//! into the core dependency graph.
//!
//! Only an in-memory reference implementation and a one-shot file
//! bootstrap loader ship here; a production Redis/DynamoDB/Consul
//! backend is out of scope for this crate (specification §1) and
//! would live in its own downstream crate implementing the same
//! trait.

pub mod error;
pub mod store;

pub use error::{PersistenceError, Result};
pub use store::{FileBootstrapStore, InMemoryPersistentStore, PersistentStore};
