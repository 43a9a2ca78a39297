// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use polycall_types::{CanonicalTypeId, CanonicalValue, Result};

use crate::registry::TypeHandle;

/// Either a primitive canonical kind or a named, registered composite
/// type. Conversion rules and lookups are keyed on this rather than on
/// `CanonicalTypeId` alone, because two languages can register distinct
/// struct layouts under the same conceptual name (scenario 6 in the
/// spec: `Point` with `f32` fields in one language, `f64` in another).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Primitive(CanonicalTypeId),
    Named(TypeHandle),
}

impl From<CanonicalTypeId> for TypeKey {
    fn from(id: CanonicalTypeId) -> Self {
        TypeKey::Primitive(id)
    }
}

/// Whether a narrowing numeric conversion truncates silently or fails.
/// Left as a per-rule choice rather than a single process-wide default
/// (§9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossyPolicy {
    /// Narrowing that would lose information fails with `NarrowingLoss`.
    Disallow,
    /// Narrowing truncates/wraps silently.
    Wrapping,
}

type ConvertFn = dyn Fn(&CanonicalValue) -> Result<CanonicalValue> + Send + Sync;
type ValidateFn = dyn Fn(&CanonicalValue) -> Result<()> + Send + Sync;

/// A registered conversion from `source` (as produced by `source_lang`) to
/// `target` (as consumed by `target_lang`).
#[derive(Clone)]
pub struct ConversionRule {
    pub source_lang: String,
    pub source: TypeKey,
    pub target_lang: String,
    pub target: TypeKey,
    pub lossy: LossyPolicy,
    convert: Arc<ConvertFn>,
    validate: Option<Arc<ValidateFn>>,
}

impl ConversionRule {
    pub fn new(
        source_lang: impl Into<String>,
        source: impl Into<TypeKey>,
        target_lang: impl Into<String>,
        target: impl Into<TypeKey>,
        convert: impl Fn(&CanonicalValue) -> Result<CanonicalValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source_lang: source_lang.into(),
            source: source.into(),
            target_lang: target_lang.into(),
            target: target.into(),
            lossy: LossyPolicy::Disallow,
            convert: Arc::new(convert),
            validate: None,
        }
    }

    pub fn lossy(mut self, policy: LossyPolicy) -> Self {
        self.lossy = policy;
        self
    }

    pub fn with_validator(
        mut self,
        validate: impl Fn(&CanonicalValue) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn key(&self) -> (String, TypeKey, String, TypeKey) {
        (
            self.source_lang.clone(),
            self.source,
            self.target_lang.clone(),
            self.target,
        )
    }

    pub fn apply(&self, value: &CanonicalValue) -> Result<CanonicalValue> {
        if let Some(validate) = &self.validate {
            validate(value)?;
        }
        (self.convert)(value)
    }
}

/// Any-language wildcard used for rules that don't depend on the caller
/// or callee's identity (e.g. built-in identity conversions).
pub const ANY_LANGUAGE: &str = "*";
