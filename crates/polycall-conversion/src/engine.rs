// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use polycall_types::{
    CanonicalTypeId, CanonicalValue, ConversionErrorKind, Ownership, Payload, PolyCallError,
    Result, TypeDescriptor,
};

use crate::registry::TypeRegistry;
use crate::rule::{ConversionRule, LossyPolicy, TypeKey, ANY_LANGUAGE};

type RuleKey = (String, TypeKey, String, TypeKey);

/// The type mapping and conversion engine (C1): an append-only type
/// catalogue plus a direct-hash table of conversion rules, with a
/// built-in fallback for primitive-to-primitive conversions that have no
/// explicitly registered rule.
pub struct ConversionEngine {
    pub types: Arc<TypeRegistry>,
    rules: RwLock<HashMap<RuleKey, ConversionRule>>,
}

impl ConversionEngine {
    pub fn new() -> Self {
        Self {
            types: Arc::new(TypeRegistry::new()),
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_registry(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_conversion(&self, rule: ConversionRule) {
        let key = rule.key();
        tracing::debug!(
            source_lang = %key.0,
            target_lang = %key.2,
            "registered conversion rule"
        );
        self.rules.write().insert(key, rule);
    }

    /// Direct hash on the four-tuple, then the any-language wildcard on
    /// each side, mirroring how identity conversions are registered
    /// independent of the calling language.
    fn find_rule(
        &self,
        source_lang: &str,
        source: TypeKey,
        target_lang: &str,
        target: TypeKey,
    ) -> Option<ConversionRule> {
        let rules = self.rules.read();
        let candidates = [
            (source_lang, target_lang),
            (ANY_LANGUAGE, target_lang),
            (source_lang, ANY_LANGUAGE),
            (ANY_LANGUAGE, ANY_LANGUAGE),
        ];
        for (src, tgt) in candidates {
            if let Some(rule) = rules.get(&(src.to_string(), source, tgt.to_string(), target)) {
                return Some(rule.clone());
            }
        }
        None
    }

    /// Applies a conversion from `value`'s current type to `target`,
    /// following §4.1's algorithm: direct rule lookup, else (for
    /// primitive-to-primitive pairs) the built-in numeric/string
    /// conversion that stands in for the "identity-pivoted" two-step
    /// path, else `ConversionFailed(NotFound)`.
    pub fn convert(
        &self,
        value: &CanonicalValue,
        source_lang: &str,
        target_lang: &str,
        target: TypeKey,
    ) -> Result<CanonicalValue> {
        let source = TypeKey::Primitive(value.type_id);
        if let Some(rule) = self.find_rule(source_lang, source, target_lang, target) {
            return rule.apply(value);
        }

        match target {
            TypeKey::Primitive(target_id) if value.type_id.is_primitive() => {
                convert_primitive(value, target_id, LossyPolicy::Disallow)
            }
            _ => Err(PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NotFound,
                detail: format!(
                    "no conversion from {}:{:?} to {}:{:?}",
                    source_lang, value.type_id, target_lang, target
                ),
            }),
        }
    }

    /// Validates `value` against `descriptor` without converting it:
    /// used by the dispatch core (C4) to check signature compatibility
    /// before any conversion is attempted (§4.4 step 3).
    pub fn validate(&self, value: &CanonicalValue, descriptor: &TypeDescriptor) -> Result<()> {
        match descriptor {
            TypeDescriptor::Primitive(id) => {
                if value.type_id == *id {
                    Ok(())
                } else {
                    Err(PolyCallError::SignatureMismatch(format!(
                        "expected {:?}, found {:?}",
                        id, value.type_id
                    )))
                }
            }
            TypeDescriptor::Struct { .. } => {
                if value.type_id == CanonicalTypeId::Struct {
                    Ok(())
                } else {
                    Err(PolyCallError::SignatureMismatch(format!(
                        "expected struct, found {:?}",
                        value.type_id
                    )))
                }
            }
            TypeDescriptor::Array { .. } => {
                if value.type_id == CanonicalTypeId::Array {
                    Ok(())
                } else {
                    Err(PolyCallError::SignatureMismatch(format!(
                        "expected array, found {:?}",
                        value.type_id
                    )))
                }
            }
            TypeDescriptor::Callback { .. } => {
                if value.type_id == CanonicalTypeId::Callback {
                    Ok(())
                } else {
                    Err(PolyCallError::SignatureMismatch(format!(
                        "expected callback, found {:?}",
                        value.type_id
                    )))
                }
            }
        }
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks a struct's fields in declaration order, converting the source
/// struct's field values into the target descriptor's fields. Missing
/// optional fields are zero-initialized; missing required fields fail.
/// `field_values` supplies the source struct's current field values by
/// name (the memory bridge resolves these from the region backing the
/// source composite handle).
pub fn convert_struct_fields(
    engine: &ConversionEngine,
    source_lang: &str,
    target_lang: &str,
    target: &TypeDescriptor,
    field_values: &HashMap<String, CanonicalValue>,
) -> Result<HashMap<String, CanonicalValue>> {
    let TypeDescriptor::Struct { fields, .. } = target else {
        return Err(PolyCallError::InvalidParameter(
            "convert_struct_fields requires a struct descriptor".into(),
        ));
    };
    let mut out = HashMap::with_capacity(fields.len());
    for field in fields {
        match field_values.get(&field.name) {
            Some(value) => {
                let converted = engine.convert(
                    value,
                    source_lang,
                    target_lang,
                    TypeKey::Primitive(field.type_id),
                )?;
                out.insert(field.name.clone(), converted);
            }
            None if field.optional => {
                out.insert(field.name.clone(), zero_value(field.type_id));
            }
            None => {
                return Err(PolyCallError::ConversionFailed {
                    kind: ConversionErrorKind::NotFound,
                    detail: format!("missing required field '{}'", field.name),
                });
            }
        }
    }
    Ok(out)
}

fn zero_value(id: CanonicalTypeId) -> CanonicalValue {
    use CanonicalTypeId::*;
    let payload = match id {
        Void => Payload::Void,
        Bool => Payload::Bool(false),
        Char => Payload::Char('\0'),
        I8 => Payload::I8(0),
        I16 => Payload::I16(0),
        I32 => Payload::I32(0),
        I64 => Payload::I64(0),
        U8 => Payload::U8(0),
        U16 => Payload::U16(0),
        U32 => Payload::U32(0),
        U64 => Payload::U64(0),
        F32 => Payload::F32(0.0),
        F64 => Payload::F64(0.0),
        String => Payload::String {
            bytes: Arc::from(Vec::new().into_boxed_slice()),
            ownership: Ownership::Owned,
        },
        Pointer => Payload::Pointer(0),
        Struct | Array | Object | Callback => Payload::Void,
    };
    CanonicalValue { type_id: id, payload }
}

/// Strictly value-preserving conversion between primitive canonical
/// types (§4.1). Same-width primitives always succeed exactly.
/// Narrowing integers fail with `NarrowingLoss` unless `policy` allows
/// wrapping. Float-to-integer truncates toward zero and fails on
/// non-finite input. Strings always round-trip through UTF-8 (already
/// guaranteed by Rust's `String`/`str` invariants at this layer).
pub fn convert_primitive(
    value: &CanonicalValue,
    target: CanonicalTypeId,
    policy: LossyPolicy,
) -> Result<CanonicalValue> {
    if value.type_id == target {
        return Ok(value.clone());
    }

    let as_f64 = to_f64(value);
    // A finite float source is truncated toward zero into the same i128
    // pivot an integer source would produce, so both funnel through the
    // same per-target narrowing below instead of a fake intermediate type.
    let as_i128 = match to_i128(value)? {
        Some(i) => Some(i),
        None => match as_f64 {
            Some(f) if !f.is_finite() => {
                return Err(PolyCallError::ConversionFailed {
                    kind: ConversionErrorKind::NonFinite,
                    detail: format!("cannot convert non-finite float {f} to integer"),
                });
            }
            Some(f) => Some(f.trunc() as i128),
            None => None,
        },
    };

    use CanonicalTypeId::*;
    let payload = match (target, as_i128, as_f64) {
        (Bool, Some(i), _) => Payload::Bool(i != 0),
        (I8, Some(i), _) => Payload::I8(narrow_int(i, policy)?),
        (I16, Some(i), _) => Payload::I16(narrow_int(i, policy)?),
        (I32, Some(i), _) => Payload::I32(narrow_int(i, policy)?),
        (I64, Some(i), _) => Payload::I64(narrow_int(i, policy)?),
        (U8, Some(i), _) => Payload::U8(narrow_uint(i, policy)?),
        (U16, Some(i), _) => Payload::U16(narrow_uint(i, policy)?),
        (U32, Some(i), _) => Payload::U32(narrow_uint(i, policy)?),
        (U64, Some(i), _) => Payload::U64(narrow_uint(i, policy)?),
        (F32, _, Some(f)) => Payload::F32(f as f32),
        (F64, _, Some(f)) => Payload::F64(f),
        _ => {
            return Err(PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NotFound,
                detail: format!("no primitive conversion from {:?} to {target:?}", value.type_id),
            })
        }
    };
    Ok(CanonicalValue { type_id: target, payload })
}

fn to_i128(value: &CanonicalValue) -> Result<Option<i128>> {
    Ok(match &value.payload {
        Payload::Bool(v) => Some(*v as i128),
        Payload::I8(v) => Some(*v as i128),
        Payload::I16(v) => Some(*v as i128),
        Payload::I32(v) => Some(*v as i128),
        Payload::I64(v) => Some(*v as i128),
        Payload::U8(v) => Some(*v as i128),
        Payload::U16(v) => Some(*v as i128),
        Payload::U32(v) => Some(*v as i128),
        Payload::U64(v) => Some(*v as i128),
        Payload::Char(v) => Some(*v as i128),
        _ => None,
    })
}

fn to_f64(value: &CanonicalValue) -> Option<f64> {
    match &value.payload {
        Payload::F32(v) => Some(*v as f64),
        Payload::F64(v) => Some(*v),
        Payload::I8(v) => Some(*v as f64),
        Payload::I16(v) => Some(*v as f64),
        Payload::I32(v) => Some(*v as f64),
        Payload::I64(v) => Some(*v as f64),
        Payload::U8(v) => Some(*v as f64),
        Payload::U16(v) => Some(*v as f64),
        Payload::U32(v) => Some(*v as f64),
        Payload::U64(v) => Some(*v as f64),
        _ => None,
    }
}

fn narrow_int<T>(v: i128, policy: LossyPolicy) -> Result<T>
where
    T: TryFrom<i128> + Copy + Into<i128>,
{
    match T::try_from(v) {
        Ok(narrowed) => Ok(narrowed),
        Err(_) => match policy {
            LossyPolicy::Wrapping => wrap_int(v),
            LossyPolicy::Disallow => Err(PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NarrowingLoss,
                detail: format!("value {v} does not fit target integer type"),
            }),
        },
    }
}

fn narrow_uint<T>(v: i128, policy: LossyPolicy) -> Result<T>
where
    T: TryFrom<i128> + Copy,
{
    match T::try_from(v) {
        Ok(narrowed) => Ok(narrowed),
        Err(_) => match policy {
            LossyPolicy::Wrapping => wrap_uint(v),
            LossyPolicy::Disallow => Err(PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NarrowingLoss,
                detail: format!("value {v} does not fit target unsigned integer type"),
            }),
        },
    }
}

fn wrap_int<T>(v: i128) -> Result<T>
where
    T: TryFrom<i128> + Copy + Into<i128>,
{
    // Two's-complement truncation to the target width via byte masking.
    let bytes_len = std::mem::size_of::<T>();
    let mask: i128 = if bytes_len >= 16 {
        -1
    } else {
        (1i128 << (bytes_len * 8)) - 1
    };
    let truncated = v & mask;
    let sign_bit = 1i128 << (bytes_len * 8 - 1);
    let signed = if truncated & sign_bit != 0 {
        truncated - (mask + 1)
    } else {
        truncated
    };
    T::try_from(signed).map_err(|_| PolyCallError::ConversionFailed {
        kind: ConversionErrorKind::NarrowingLoss,
        detail: "wrapping conversion failed unexpectedly".into(),
    })
}

fn wrap_uint<T>(v: i128) -> Result<T>
where
    T: TryFrom<i128> + Copy,
{
    let bytes_len = std::mem::size_of::<T>();
    let mask: i128 = if bytes_len >= 16 {
        -1
    } else {
        (1i128 << (bytes_len * 8)) - 1
    };
    let truncated = v & mask;
    T::try_from(truncated).map_err(|_| PolyCallError::ConversionFailed {
        kind: ConversionErrorKind::NarrowingLoss,
        detail: "wrapping conversion failed unexpectedly".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_width_conversion_is_exact() {
        let v = CanonicalValue::i32(42);
        let out = convert_primitive(&v, CanonicalTypeId::U32, LossyPolicy::Disallow).unwrap();
        assert!(matches!(out.payload, Payload::U32(42)));
    }

    #[test]
    fn narrowing_without_wrap_flag_fails() {
        let v = CanonicalValue::i32(i32::MAX);
        let err = convert_primitive(&v, CanonicalTypeId::I8, LossyPolicy::Disallow).unwrap_err();
        assert!(matches!(
            err,
            PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NarrowingLoss,
                ..
            }
        ));
    }

    #[test]
    fn narrowing_with_wrap_flag_truncates() {
        let v = CanonicalValue::i32(300);
        let out = convert_primitive(&v, CanonicalTypeId::U8, LossyPolicy::Wrapping).unwrap();
        assert!(matches!(out.payload, Payload::U8(44)));
    }

    #[test]
    fn float_to_int_truncates_toward_zero() {
        let v = CanonicalValue::f64(3.9);
        let out = convert_primitive(&v, CanonicalTypeId::I32, LossyPolicy::Disallow).unwrap();
        assert!(matches!(out.payload, Payload::I32(3)));
        let v = CanonicalValue::f64(-3.9);
        let out = convert_primitive(&v, CanonicalTypeId::I32, LossyPolicy::Disallow).unwrap();
        assert!(matches!(out.payload, Payload::I32(-3)));
    }

    #[test]
    fn out_of_range_float_to_int_fails_instead_of_wrapping_silently() {
        let v = CanonicalValue::f64(1e20);
        let err = convert_primitive(&v, CanonicalTypeId::I64, LossyPolicy::Disallow).unwrap_err();
        assert!(matches!(
            err,
            PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NarrowingLoss,
                ..
            }
        ));
        let out = convert_primitive(&v, CanonicalTypeId::I64, LossyPolicy::Wrapping).unwrap();
        assert!(matches!(out.payload, Payload::I64(i) if i != i64::MAX));
    }

    #[test]
    fn non_finite_float_to_int_fails() {
        let v = CanonicalValue::f64(f64::NAN);
        let err = convert_primitive(&v, CanonicalTypeId::I32, LossyPolicy::Disallow).unwrap_err();
        assert!(matches!(
            err,
            PolyCallError::ConversionFailed {
                kind: ConversionErrorKind::NonFinite,
                ..
            }
        ));
    }

    #[test]
    fn engine_falls_back_to_builtin_for_unregistered_primitive_pair() {
        let engine = ConversionEngine::new();
        let v = CanonicalValue::i32(7);
        let out = engine
            .convert(&v, "A", "B", TypeKey::Primitive(CanonicalTypeId::I64))
            .unwrap();
        assert!(matches!(out.payload, Payload::I64(7)));
    }

    #[test]
    fn engine_prefers_registered_rule_over_builtin() {
        let engine = ConversionEngine::new();
        engine.register_conversion(ConversionRule::new(
            "A",
            CanonicalTypeId::I32,
            "B",
            CanonicalTypeId::I32,
            |_| Ok(CanonicalValue::i32(-1)),
        ));
        let out = engine
            .convert(
                &CanonicalValue::i32(7),
                "A",
                "B",
                TypeKey::Primitive(CanonicalTypeId::I32),
            )
            .unwrap();
        assert!(matches!(out.payload, Payload::I32(-1)));
    }
}
