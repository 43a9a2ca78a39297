// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use polycall_types::{FunctionSignature, IsolationLevel, PermissionBits};

/// A registered function (§3 Function record). The callee itself lives
/// inside the owning bridge (handed to it at `register_function`); this
/// record is what the dispatch core consults to find and validate a
/// call before handing it to that bridge.
pub struct FunctionRecord {
    pub name: String,
    pub source_language: String,
    pub signature: Arc<FunctionSignature>,
    pub permissions: PermissionBits,
    pub isolation: IsolationLevel,
}

impl FunctionRecord {
    pub fn new(
        name: impl Into<String>,
        source_language: impl Into<String>,
        signature: Arc<FunctionSignature>,
        permissions: PermissionBits,
        isolation: IsolationLevel,
    ) -> Self {
        Self {
            name: name.into(),
            source_language: source_language.into(),
            signature,
            permissions,
            isolation,
        }
    }
}
