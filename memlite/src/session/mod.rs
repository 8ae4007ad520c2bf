// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session store management: registry, LRU eviction, idle reaping.

pub mod manager;
pub mod models;

pub use manager::{SessionError, SessionStoreManager};
pub use models::{HealthStatus, SessionMetadata, SessionStoreConfig};
