// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use polycall_bridge::{BridgeContract, CapabilityFlags};

/// A registered language (§3 Language registration): its label, its
/// bridge contract implementation, the capability flags it declared,
/// and an optional trust level bounding its maximum permissions.
/// Immutable after `register`; cleared at `unregister`.
pub struct LanguageRegistration {
    pub label: String,
    pub bridge: Arc<dyn BridgeContract>,
    pub capability_flags: CapabilityFlags,
    pub trust_level: Option<u8>,
}

impl LanguageRegistration {
    pub fn new(label: impl Into<String>, bridge: Arc<dyn BridgeContract>) -> Self {
        let capability_flags = bridge.capability_flags();
        Self {
            label: label.into(),
            bridge,
            capability_flags,
            trust_level: None,
        }
    }

    pub fn with_trust_level(mut self, level: u8) -> Self {
        self.trust_level = Some(level);
        self
    }
}
