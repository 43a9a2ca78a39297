// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::any::Any;
use std::sync::Arc;

use polycall_security::{AuditLevel, SecurityLevel};

/// Immutable configuration supplied at `Context::init` (§6). Every field
/// carries the documented default below; construct one with
/// [`PolyCallConfigBuilder`] for fluent overrides, mirroring the
/// `ProgramSettings` builder pattern this crate's VM lineage uses.
#[derive(Clone)]
pub struct PolyCallConfig {
    pub function_capacity: usize,
    pub type_capacity: usize,
    pub memory_pool_size: usize,
    pub security_level: SecurityLevel,
    pub default_deny: bool,
    pub audit_level: AuditLevel,
    pub audit_ring_size: usize,
    pub enable_performance_cache: bool,
    pub performance_cache_capacity: usize,
    pub user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl Default for PolyCallConfig {
    fn default() -> Self {
        Self {
            function_capacity: 64,
            type_capacity: 128,
            memory_pool_size: 1024 * 1024,
            security_level: SecurityLevel::default(),
            default_deny: true,
            audit_level: AuditLevel::default(),
            audit_ring_size: 1024,
            enable_performance_cache: true,
            performance_cache_capacity: 256,
            user_data: None,
        }
    }
}

impl std::fmt::Debug for PolyCallConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolyCallConfig")
            .field("function_capacity", &self.function_capacity)
            .field("type_capacity", &self.type_capacity)
            .field("memory_pool_size", &self.memory_pool_size)
            .field("security_level", &self.security_level)
            .field("default_deny", &self.default_deny)
            .field("audit_level", &self.audit_level)
            .field("audit_ring_size", &self.audit_ring_size)
            .field("enable_performance_cache", &self.enable_performance_cache)
            .field("performance_cache_capacity", &self.performance_cache_capacity)
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}

impl PolyCallConfig {
    pub fn builder() -> PolyCallConfigBuilder {
        PolyCallConfigBuilder::default()
    }
}

/// Fluent builder for [`PolyCallConfig`]; every setter is optional and
/// falls back to the documented default.
#[derive(Default, Clone)]
pub struct PolyCallConfigBuilder {
    config: PolyCallConfigInner,
}

#[derive(Clone)]
struct PolyCallConfigInner(PolyCallConfig);

impl Default for PolyCallConfigInner {
    fn default() -> Self {
        PolyCallConfigInner(PolyCallConfig::default())
    }
}

impl PolyCallConfigBuilder {
    pub fn function_capacity(mut self, value: usize) -> Self {
        self.config.0.function_capacity = value;
        self
    }

    pub fn type_capacity(mut self, value: usize) -> Self {
        self.config.0.type_capacity = value;
        self
    }

    pub fn memory_pool_size(mut self, value: usize) -> Self {
        self.config.0.memory_pool_size = value;
        self
    }

    pub fn security_level(mut self, value: SecurityLevel) -> Self {
        self.config.0.security_level = value;
        self
    }

    pub fn default_deny(mut self, value: bool) -> Self {
        self.config.0.default_deny = value;
        self
    }

    pub fn audit_level(mut self, value: AuditLevel) -> Self {
        self.config.0.audit_level = value;
        self
    }

    pub fn audit_ring_size(mut self, value: usize) -> Self {
        self.config.0.audit_ring_size = value;
        self
    }

    pub fn enable_performance_cache(mut self, value: bool) -> Self {
        self.config.0.enable_performance_cache = value;
        self
    }

    pub fn performance_cache_capacity(mut self, value: usize) -> Self {
        self.config.0.performance_cache_capacity = value;
        self
    }

    pub fn user_data(mut self, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.config.0.user_data = Some(value);
        self
    }

    pub fn build(self) -> PolyCallConfig {
        self.config.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_spec() {
        let config = PolyCallConfig::default();
        assert_eq!(config.function_capacity, 64);
        assert_eq!(config.type_capacity, 128);
        assert_eq!(config.memory_pool_size, 1024 * 1024);
        assert!(config.default_deny);
        assert_eq!(config.audit_ring_size, 1024);
        assert!(config.enable_performance_cache);
        assert_eq!(config.performance_cache_capacity, 256);
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let config = PolyCallConfig::builder().function_capacity(8).build();
        assert_eq!(config.function_capacity, 8);
        assert_eq!(config.type_capacity, 128);
    }
}
