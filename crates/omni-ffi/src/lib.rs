//! C ABI bindings for embedding the OmniContext engine into hosts that
//! cannot speak the JSON-RPC-over-stdio protocol (native editor plugins,
//! IDE shell extensions). This crate is a thin, `unsafe`-isolated shim
//! around `omni_core::Engine` -- all indexing/search logic lives there.
//!
//! The workspace denies `unsafe_code` by default; this is the one crate
//! that legitimately needs it, so the lint is relaxed here only.
#![allow(unsafe_code)]

use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::ptr;

use omni_core::Engine;

/// Opaque handle to a live engine instance, owned by the host across the
/// FFI boundary. Never constructed or read from directly by callers --
/// only passed back into `omni_*` functions.
pub struct OmniHandle {
    engine: Engine,
    runtime: tokio::runtime::Runtime,
}

/// Open (and, if needed, cold-index) the repository at `repo_path`.
///
/// Returns a handle on success or a null pointer if the path is invalid
/// or the engine fails to initialize. The caller owns the returned
/// pointer and must release it with [`omni_close`].
///
/// # Safety
/// `repo_path` must be a valid, NUL-terminated UTF-8 C string that
/// outlives this call.
#[no_mangle]
pub unsafe extern "C" fn omni_open(repo_path: *const c_char) -> *mut OmniHandle {
    if repo_path.is_null() {
        return ptr::null_mut();
    }

    let path_str = match CStr::from_ptr(repo_path).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(_) => return ptr::null_mut(),
    };

    let engine = match runtime.block_on(Engine::new(Path::new(path_str))) {
        Ok(e) => e,
        Err(_) => return ptr::null_mut(),
    };

    Box::into_raw(Box::new(OmniHandle { engine, runtime }))
}

/// Run (or resume) a full index of the handle's repository.
///
/// Returns the number of files processed, or `-1` on error.
///
/// # Safety
/// `handle` must be a live pointer previously returned by [`omni_open`]
/// and not yet passed to [`omni_close`].
#[no_mangle]
pub unsafe extern "C" fn omni_index(handle: *mut OmniHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    let handle = &mut *handle;
    match handle.runtime.block_on(handle.engine.run_index()) {
        Ok(result) => result.files_processed as i64,
        Err(_) => -1,
    }
}

/// Run a search query against the handle's index.
///
/// Returns a heap-allocated, NUL-terminated JSON array of
/// `{file, symbol, kind, score, line_start, line_end, content}` objects.
/// The caller must release it with [`omni_free_string`]. Returns null on
/// error (including an unreachable/invalid handle or query).
///
/// # Safety
/// `handle` must be live; `query` must be a valid NUL-terminated UTF-8
/// C string.
#[no_mangle]
pub unsafe extern "C" fn omni_search(
    handle: *mut OmniHandle,
    query: *const c_char,
    limit: usize,
) -> *mut c_char {
    if handle.is_null() || query.is_null() {
        return ptr::null_mut();
    }
    let handle = &mut *handle;
    let query_str = match CStr::from_ptr(query).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    let results = match handle.runtime.block_on(handle.engine.search(query_str, limit.max(1))) {
        Ok(r) => r,
        Err(_) => return ptr::null_mut(),
    };

    let payload: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "file": r.file_path.display().to_string(),
                "symbol": r.chunk.symbol_path,
                "kind": format!("{:?}", r.chunk.kind),
                "score": r.score,
                "line_start": r.chunk.line_start,
                "line_end": r.chunk.line_end,
                "content": r.chunk.content,
            })
        })
        .collect();

    let json = match serde_json::to_string(&payload) {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    match CString::new(json) {
        Ok(c) => c.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Release a string previously returned by [`omni_search`].
///
/// # Safety
/// `s` must be a pointer previously returned by an `omni_*` function
/// that documents returning an owned string, and must not be freed
/// twice.
#[no_mangle]
pub unsafe extern "C" fn omni_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Release the engine handle and all resources it owns.
///
/// # Safety
/// `handle` must be a live pointer previously returned by [`omni_open`]
/// and must not be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn omni_close(handle: *mut OmniHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Probe whether the project's SQLite index at `repo_path` is reachable
/// and not wedged behind a stale write lock, without going through the
/// full `Engine` initialization path.
///
/// Returns `0` if healthy, `1` if the database is locked, `-1` for any
/// other error (missing data dir, corrupt database, invalid path).
///
/// # Safety
/// `repo_path` must be a valid NUL-terminated UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn omni_ensure_health(repo_path: *const c_char) -> i32 {
    if repo_path.is_null() {
        return -1;
    }
    let path_str = match CStr::from_ptr(repo_path).to_str() {
        Ok(s) => s,
        Err(_) => return -1,
    };

    let config = match omni_core::Config::load(Path::new(path_str)) {
        Ok(c) => c,
        Err(_) => return -1,
    };
    let db_path = config.data_dir().join("index.db");
    if !db_path.exists() {
        // Not yet indexed is not unhealthy -- just nothing to probe.
        return 0;
    }

    match rusqlite::Connection::open_with_flags(
        &db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    ) {
        Ok(conn) => match conn.query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0)) {
            Ok(ref s) if s == "ok" => 0,
            Ok(_) => -1,
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                1
            }
            Err(_) => -1,
        },
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::DatabaseBusy => 1,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path_c = CString::new(dir.path().to_str().unwrap()).expect("cstring");

        unsafe {
            let handle = omni_open(path_c.as_ptr());
            assert!(!handle.is_null());
            omni_close(handle);
        }
    }

    #[test]
    fn test_open_rejects_null() {
        unsafe {
            assert!(omni_open(ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ensure_health_on_empty_repo_is_healthy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path_c = CString::new(dir.path().to_str().unwrap()).expect("cstring");
        unsafe {
            assert_eq!(omni_ensure_health(path_c.as_ptr()), 0);
        }
    }

    #[test]
    fn test_search_on_empty_index_returns_empty_array() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path_c = CString::new(dir.path().to_str().unwrap()).expect("cstring");
        let query_c = CString::new("hello").expect("cstring");

        unsafe {
            let handle = omni_open(path_c.as_ptr());
            assert!(!handle.is_null());

            let result_ptr = omni_search(handle, query_c.as_ptr(), 10);
            assert!(!result_ptr.is_null());
            let result_str = CStr::from_ptr(result_ptr).to_str().unwrap().to_string();
            assert_eq!(result_str, "[]");

            omni_free_string(result_ptr);
            omni_close(handle);
        }
    }
}
