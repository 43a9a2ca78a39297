// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use crate::type_id::CanonicalTypeId;

/// One parameter of a [`FunctionSignature`].
#[derive(Debug, Clone)]
pub struct Parameter {
    pub type_id: CanonicalTypeId,
    pub name: Option<String>,
    pub optional: bool,
}

impl Parameter {
    pub fn new(type_id: CanonicalTypeId) -> Self {
        Self {
            type_id,
            name: None,
            optional: false,
        }
    }

    pub fn named(type_id: CanonicalTypeId, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: Some(name.into()),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// The typed description of a function's parameters and return value,
/// independent of any language. Immutable once built.
///
/// A variadic tail is represented as a sequence type id rather than a
/// bare flag: `variadic_type` names the element type every excess
/// argument must be compatible with, so dispatch can validate the tail
/// the same way it validates a fixed parameter.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub return_type: CanonicalTypeId,
    pub params: Vec<Parameter>,
    pub variadic: bool,
    pub variadic_type: Option<CanonicalTypeId>,
}

impl FunctionSignature {
    pub fn new(return_type: CanonicalTypeId, params: Vec<Parameter>) -> Self {
        Self {
            return_type,
            params,
            variadic: false,
            variadic_type: None,
        }
    }

    /// Marks this signature variadic, with `tail_type` as the element
    /// type every argument past `params` must be compatible with.
    pub fn variadic(mut self, tail_type: CanonicalTypeId) -> Self {
        self.variadic = true;
        self.variadic_type = Some(tail_type);
        self
    }

    /// Number of parameters that must always be supplied: the prefix of
    /// non-optional, non-variadic parameters.
    pub fn fixed_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    /// Checks an incoming argument count against this signature's arity,
    /// accounting for optional parameters and a variadic tail.
    pub fn accepts_arg_count(&self, arg_count: usize) -> bool {
        let fixed = self.fixed_arity();
        if arg_count < fixed {
            return false;
        }
        if self.variadic {
            true
        } else {
            arg_count <= self.params.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_id::CanonicalTypeId;

    #[test]
    fn fixed_arity_counts_non_optional_params() {
        let sig = FunctionSignature::new(
            CanonicalTypeId::I32,
            vec![
                Parameter::new(CanonicalTypeId::I32),
                Parameter::new(CanonicalTypeId::I32).optional(),
            ],
        );
        assert_eq!(sig.fixed_arity(), 1);
        assert!(sig.accepts_arg_count(1));
        assert!(sig.accepts_arg_count(2));
        assert!(!sig.accepts_arg_count(0));
        assert!(!sig.accepts_arg_count(3));
    }

    #[test]
    fn variadic_tail_accepts_any_excess() {
        let sig = FunctionSignature::new(
            CanonicalTypeId::I32,
            vec![Parameter::new(CanonicalTypeId::I32)],
        )
        .variadic(CanonicalTypeId::I32);
        assert_eq!(sig.variadic_type, Some(CanonicalTypeId::I32));
        assert!(sig.accepts_arg_count(1));
        assert!(sig.accepts_arg_count(10));
        assert!(!sig.accepts_arg_count(0));
    }
}
