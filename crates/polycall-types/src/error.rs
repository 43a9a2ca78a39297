// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use thiserror::Error;

use crate::permission::PermissionBits;

/// What was missing or absent for a [`PolyCallError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Function,
    Language,
    Type,
    Region,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotFoundKind::Function => "function",
            NotFoundKind::Language => "language",
            NotFoundKind::Type => "type",
            NotFoundKind::Region => "region",
        };
        write!(f, "{s}")
    }
}

/// Sub-kind of a failed conversion (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionErrorKind {
    NotFound,
    NarrowingLoss,
    MalformedUtf8,
    NonFinite,
}

impl std::fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConversionErrorKind::NotFound => "conversion not found",
            ConversionErrorKind::NarrowingLoss => "narrowing loss",
            ConversionErrorKind::MalformedUtf8 => "malformed utf-8",
            ConversionErrorKind::NonFinite => "non-finite numeric",
        };
        write!(f, "{s}")
    }
}

/// The single error type returned by every fallible operation across the
/// workspace (§7). One variant per named error kind; subsystem-local
/// errors convert into this via `From` so `?` composes across crate
/// boundaries.
#[derive(Debug, Error)]
pub enum PolyCallError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("capacity exceeded: {resource}")]
    CapacityExceeded { resource: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: NotFoundKind, name: String },

    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    #[error("signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("conversion failed ({kind}): {detail}")]
    ConversionFailed {
        kind: ConversionErrorKind,
        detail: String,
    },

    #[error("permission denied: missing {missing}")]
    PermissionDenied { missing: PermissionBits },

    #[error("isolation violation: effective level {effective} exceeds maximum {maximum}")]
    IsolationViolation { effective: String, maximum: String },

    #[error("permission escalation: requested {requested}, owner grants {owner}")]
    PermissionEscalation {
        requested: PermissionBits,
        owner: PermissionBits,
    },

    #[error("region still borrowed: {0} active borrower(s)")]
    StillBorrowed(usize),

    #[error("bridge fault in {language}: {diagnostic}")]
    BridgeFault { language: String, diagnostic: String },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, PolyCallError>;
