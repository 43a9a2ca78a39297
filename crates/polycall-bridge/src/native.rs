// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! A minimal, real (non-mock) reference adapter: it loads a shared
//! library with `dlopen`/`dlsym` and invokes exported C functions
//! through a small per-arity trampoline built from the canonical
//! signature. This is the conformance fixture the test suite dispatches
//! calls through (§4.6); it is not one of the out-of-scope
//! per-language adapters an embedder builds against a live
//! JVM/Python/JS/Cobol runtime.

use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::sync::Arc;

use libc::{dlclose, dlerror, dlopen, dlsym, RTLD_NOW};
use parking_lot::RwLock;
use polycall_types::{
    CanonicalTypeId, CanonicalValue, ConversionErrorKind, FunctionSignature, Payload,
    PolyCallError, Result, TypeDescriptor,
};

use crate::contract::{BridgeContract, BridgeFaultKind, CalleeHandle, CapabilityFlags, NativeOpaque};

fn last_dlerror() -> String {
    unsafe {
        let msg = dlerror();
        if msg.is_null() {
            "unknown dynamic linker error".to_string()
        } else {
            std::ffi::CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    }
}

struct NativeFunction {
    address: usize,
    signature: Arc<FunctionSignature>,
}

/// A handle loaded from a shared library: a raw function address at a
/// given symbol. `register_function`'s `CalleeHandle` for this adapter
/// must be one of these (produced by `NativeBridge::load_symbol`), not
/// an arbitrary opaque value.
pub struct NativeCallee {
    pub address: usize,
}

struct LibraryHandle(*mut c_void);
// SAFETY: the handle returned by dlopen is an opaque library reference;
// it is never dereferenced directly, only passed back into dlsym/dlclose,
// both of which tolerate concurrent use across threads on the platforms
// this crate targets.
unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

/// Loads a shared library and invokes its exported functions through a
/// transmute-based trampoline covering the small set of canonical
/// signatures this reference adapter supports: up to four `i32`/`i64`
/// parameters returning `i32`/`i64`, or up to two `f32`/`f64` parameters
/// returning `f32`/`f64`.
pub struct NativeBridge {
    language: String,
    library: LibraryHandle,
    functions: RwLock<HashMap<String, NativeFunction>>,
}

impl NativeBridge {
    pub fn load(language: impl Into<String>, library_path: &str) -> Result<Self> {
        let c_path = CString::new(library_path).map_err(|_| {
            PolyCallError::InvalidParameter("library path contains an interior NUL".into())
        })?;
        let handle = unsafe { dlopen(c_path.as_ptr(), RTLD_NOW) };
        if handle.is_null() {
            return Err(PolyCallError::BridgeFault {
                language: "native".into(),
                diagnostic: format!("dlopen failed for '{library_path}': {}", last_dlerror()),
            });
        }
        Ok(Self {
            language: language.into(),
            library: LibraryHandle(handle),
            functions: RwLock::new(HashMap::new()),
        })
    }

    /// Resolves `symbol` in the loaded library into a [`NativeCallee`]
    /// usable as the `CalleeHandle` for `register_function`.
    pub fn load_symbol(&self, symbol: &str) -> Result<NativeCallee> {
        let c_symbol = CString::new(symbol).map_err(|_| {
            PolyCallError::InvalidParameter("symbol name contains an interior NUL".into())
        })?;
        unsafe { dlerror() };
        let ptr = unsafe { dlsym(self.library.0, c_symbol.as_ptr()) };
        if ptr.is_null() {
            return Err(PolyCallError::BridgeFault {
                language: "native".into(),
                diagnostic: format!("dlsym failed for '{symbol}': {}", last_dlerror()),
            });
        }
        Ok(NativeCallee { address: ptr as usize })
    }
}

impl Drop for NativeBridge {
    fn drop(&mut self) {
        unsafe {
            dlclose(self.library.0);
        }
    }
}

fn canonical_to_i64(value: &CanonicalValue) -> Result<i64> {
    match &value.payload {
        Payload::I8(v) => Ok(*v as i64),
        Payload::I16(v) => Ok(*v as i64),
        Payload::I32(v) => Ok(*v as i64),
        Payload::I64(v) => Ok(*v),
        Payload::U8(v) => Ok(*v as i64),
        Payload::U16(v) => Ok(*v as i64),
        Payload::U32(v) => Ok(*v as i64),
        Payload::Bool(v) => Ok(*v as i64),
        _ => Err(PolyCallError::ConversionFailed {
            kind: ConversionErrorKind::NotFound,
            detail: format!("NativeBridge cannot pass {:?} as an integer argument", value.type_id),
        }),
    }
}

fn canonical_to_f64(value: &CanonicalValue) -> Result<f64> {
    match &value.payload {
        Payload::F32(v) => Ok(*v as f64),
        Payload::F64(v) => Ok(*v),
        _ => Err(PolyCallError::ConversionFailed {
            kind: ConversionErrorKind::NotFound,
            detail: format!("NativeBridge cannot pass {:?} as a float argument", value.type_id),
        }),
    }
}

/// Invokes the function at `address` per the small fixed set of
/// signatures this reference trampoline supports, chosen by the
/// signature's return type and parameter count.
unsafe fn invoke_trampoline(
    address: usize,
    signature: &FunctionSignature,
    args: &[CanonicalValue],
) -> Result<CanonicalValue> {
    let arity = signature.params.len();
    match signature.return_type {
        CanonicalTypeId::I32 | CanonicalTypeId::I64 | CanonicalTypeId::Bool => {
            let ints: Vec<i64> = args.iter().map(canonical_to_i64).collect::<Result<_>>()?;
            let result: i64 = match arity {
                0 => {
                    let f: extern "C" fn() -> i64 = std::mem::transmute(address);
                    f()
                }
                1 => {
                    let f: extern "C" fn(i64) -> i64 = std::mem::transmute(address);
                    f(ints[0])
                }
                2 => {
                    let f: extern "C" fn(i64, i64) -> i64 = std::mem::transmute(address);
                    f(ints[0], ints[1])
                }
                3 => {
                    let f: extern "C" fn(i64, i64, i64) -> i64 = std::mem::transmute(address);
                    f(ints[0], ints[1], ints[2])
                }
                4 => {
                    let f: extern "C" fn(i64, i64, i64, i64) -> i64 = std::mem::transmute(address);
                    f(ints[0], ints[1], ints[2], ints[3])
                }
                n => {
                    return Err(PolyCallError::InvalidParameter(format!(
                        "NativeBridge reference trampoline supports at most 4 integer arguments, got {n}"
                    )))
                }
            };
            Ok(match signature.return_type {
                CanonicalTypeId::I32 => CanonicalValue::i32(result as i32),
                CanonicalTypeId::I64 => CanonicalValue::i64(result),
                _ => CanonicalValue::bool(result != 0),
            })
        }
        CanonicalTypeId::F32 | CanonicalTypeId::F64 => {
            let floats: Vec<f64> = args.iter().map(canonical_to_f64).collect::<Result<_>>()?;
            let result: f64 = match arity {
                0 => {
                    let f: extern "C" fn() -> f64 = std::mem::transmute(address);
                    f()
                }
                1 => {
                    let f: extern "C" fn(f64) -> f64 = std::mem::transmute(address);
                    f(floats[0])
                }
                2 => {
                    let f: extern "C" fn(f64, f64) -> f64 = std::mem::transmute(address);
                    f(floats[0], floats[1])
                }
                n => {
                    return Err(PolyCallError::InvalidParameter(format!(
                        "NativeBridge reference trampoline supports at most 2 float arguments, got {n}"
                    )))
                }
            };
            Ok(match signature.return_type {
                CanonicalTypeId::F32 => CanonicalValue::f32(result as f32),
                _ => CanonicalValue::f64(result),
            })
        }
        other => Err(PolyCallError::InvalidParameter(format!(
            "NativeBridge reference trampoline does not support return type {other:?}"
        ))),
    }
}

impl BridgeContract for NativeBridge {
    fn language(&self) -> &str {
        &self.language
    }

    fn capability_flags(&self) -> CapabilityFlags {
        // dlsym'd C functions are not reentrant-safe by default; the core
        // serializes dispatch to this adapter via its adapter lock.
        CapabilityFlags::NONE
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn cleanup(&self) {
        self.functions.write().clear();
    }

    fn convert_to_native(
        &self,
        value: &CanonicalValue,
        _descriptor: &TypeDescriptor,
    ) -> Result<NativeOpaque> {
        Ok(Box::new(value.clone()))
    }

    fn convert_from_native(
        &self,
        native: &NativeOpaque,
        _descriptor: &TypeDescriptor,
    ) -> Result<CanonicalValue> {
        native
            .downcast_ref::<CanonicalValue>()
            .cloned()
            .ok_or_else(|| PolyCallError::BridgeFault {
                language: self.language.clone(),
                diagnostic: "native opaque was not produced by NativeBridge".into(),
            })
    }

    fn register_function(
        &self,
        name: &str,
        callee: CalleeHandle,
        signature: Arc<FunctionSignature>,
        _flags: CapabilityFlags,
    ) -> Result<()> {
        let callee = callee.downcast::<NativeCallee>().map_err(|_| {
            PolyCallError::InvalidParameter(
                "NativeBridge requires a CalleeHandle produced by NativeBridge::load_symbol".into(),
            )
        })?;
        self.functions.write().insert(
            name.to_string(),
            NativeFunction {
                address: callee.address,
                signature,
            },
        );
        Ok(())
    }

    fn call(&self, name: &str, args: &[CanonicalValue]) -> Result<CanonicalValue> {
        let (address, signature) = {
            let functions = self.functions.read();
            let entry = functions.get(name).ok_or_else(|| PolyCallError::NotFound {
                kind: polycall_types::NotFoundKind::Function,
                name: name.to_string(),
            })?;
            (entry.address, Arc::clone(&entry.signature))
        };
        // SAFETY: `address` was resolved by dlsym against a signature the
        // caller declared at registration; mismatches between the
        // declared and actual C signature are the embedder's
        // responsibility, as with any FFI trampoline.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
            invoke_trampoline(address, &signature, args)
        }));
        match outcome {
            Ok(result) => result,
            Err(_) => Err(PolyCallError::BridgeFault {
                language: self.language.clone(),
                diagnostic: format!("native function '{name}' panicked"),
            }),
        }
    }

    fn acquire_memory(&self, _handle: u64, _size: usize) -> Result<()> {
        Ok(())
    }

    fn release_memory(&self, _handle: u64) -> Result<()> {
        Ok(())
    }

    fn translate_exception(&self, opaque: &NativeOpaque) -> (String, BridgeFaultKind) {
        match opaque.downcast_ref::<String>() {
            Some(msg) => (msg.clone(), BridgeFaultKind::HostException),
            None => ("unrecognized native exception payload".to_string(), BridgeFaultKind::HostException),
        }
    }
}
