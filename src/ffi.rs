//! FFI bindings for the flight delay model
//!
//! This module provides C-compatible functions for training and predicting from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `delay_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::fmt::Display;
use std::os::raw::c_char;
use std::ptr;

use crate::error::DelayError;
use crate::pipeline::{predict_delays, train_delay_model};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn reset_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

/// Record `err` for `delay_last_error` and return NULL
fn fail(err: impl Display) -> *mut c_char {
    // Interior NULs would truncate the message, so they are replaced
    let message = err.to_string().replace('\0', "\u{fffd}");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = CString::new(message).ok());
    ptr::null_mut()
}

/// Copy a caller-owned C string argument, naming it in the error
unsafe fn read_arg(arg: *const c_char, name: &str) -> Result<String, String> {
    if arg.is_null() {
        return Err(format!("Null {name} pointer"));
    }
    CStr::from_ptr(arg)
        .to_str()
        .map(str::to_owned)
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

/// Hand a result to the caller, who frees it with `delay_free_string`
fn into_c_string(result: Result<String, DelayError>) -> *mut c_char {
    match result.map(CString::new) {
        Ok(Ok(out)) => out.into_raw(),
        Ok(Err(nul)) => fail(format!("result contains a NUL byte at {}", nul.nul_position())),
        Err(err) => fail(err),
    }
}

// ============================================================================
// Training and Prediction
// ============================================================================

/// Train on a JSON array of flight records and save the model to `model_path`.
///
/// # Safety
/// - `records_json` and `model_path` must be valid null-terminated C strings.
/// - Returns the saved artifact as JSON in a newly allocated string that must be
///   freed with `delay_free_string`.
/// - Returns NULL on error; call `delay_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn delay_train(
    records_json: *const c_char,
    model_path: *const c_char,
) -> *mut c_char {
    reset_error();

    let records = match read_arg(records_json, "records_json") {
        Ok(records) => records,
        Err(msg) => return fail(msg),
    };
    let path = match read_arg(model_path, "model_path") {
        Ok(path) => path,
        Err(msg) => return fail(msg),
    };

    into_c_string(train_delay_model(records, path))
}

/// Predict delays for a `{"flights": [...]}` request using the model at `model_path`.
///
/// # Safety
/// - `request_json` and `model_path` must be valid null-terminated C strings.
/// - Returns a `{"predict": [...]}` JSON string that must be freed with
///   `delay_free_string`.
/// - Returns NULL on error (including validation failures); call
///   `delay_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn delay_predict(
    request_json: *const c_char,
    model_path: *const c_char,
) -> *mut c_char {
    reset_error();

    let request = match read_arg(request_json, "request_json") {
        Ok(request) => request,
        Err(msg) => return fail(msg),
    };
    let path = match read_arg(model_path, "model_path") {
        Ok(path) => path,
        Err(msg) => return fail(msg),
    };

    into_c_string(predict_delays(request, path))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by `delay_train` or `delay_predict`.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by one of those functions, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn delay_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next call into this library on
///   this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn delay_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn delay_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
