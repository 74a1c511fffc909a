//! The `env` host package offered to every module run by the CLI.
//!
//! Each binding writes one line to a shared writer: standard output for the
//! binary, a byte buffer in tests.

use std::io::Write;
use std::sync::{Arc, Mutex};
use tarn_core::traits::HostBinding;
use tarn_core::{Error, FuncType, Result, Status, Value};

/// Names of the functions in the `env` package.
pub const ENV_FUNCTIONS: [&str; 5] = ["print_i32", "print_i64", "print_f32", "print_f64", "print_str"];

/// Writer shared between the bindings.
pub type SharedWriter<W> = Arc<Mutex<W>>;

fn emit<W: Write>(out: &Mutex<W>, line: &str) -> Result<()> {
    let mut out = out.lock().map_err(|_| Error::Backend {
        message: "host output lock poisoned".to_string(),
        source: None,
    })?;
    writeln!(out, "{line}").map_err(|e| Error::Backend {
        message: "failed to write host output".to_string(),
        source: Some(Box::new(e)),
    })
}

fn print_value<W, F>(out: &SharedWriter<W>, name: &str, params: &str, render: F) -> HostBinding
where
    W: Write + Send + 'static,
    F: Fn(&Value) -> String + Send + Sync + 'static,
{
    let out = Arc::clone(out);
    let ty = FuncType::from_tags("v", params).unwrap_or_default();
    HostBinding::new(name, ty, move |_, args, _| {
        let line = args.first().map(&render).unwrap_or_default();
        emit(&out, &line)
    })
}

/// Reads `len` bytes at `ptr` from guest memory as (lossy) UTF-8.
///
/// # Errors
///
/// Returns `TrapMemoryOutOfBounds` if the range leaves the memory.
pub fn read_guest_str(memory: &[u8], ptr: u32, len: u32) -> Result<String> {
    let start = ptr as usize;
    let bytes = start
        .checked_add(len as usize)
        .and_then(|end| memory.get(start..end))
        .ok_or_else(|| {
            Error::trap(
                Status::TrapMemoryOutOfBounds,
                format!("print_str: {len} bytes at {ptr} exceed a memory of {} bytes", memory.len()),
            )
        })?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Builds the `env` bindings writing to `out`.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use tarn_cli::host::env_bindings;
///
/// let out = Arc::new(Mutex::new(Vec::<u8>::new()));
/// let bindings = env_bindings(&out);
/// assert_eq!(bindings.len(), 5);
/// assert!(bindings.iter().all(|b| b.module() == "env"));
/// ```
pub fn env_bindings<W: Write + Send + 'static>(out: &SharedWriter<W>) -> Vec<HostBinding> {
    let str_out = Arc::clone(out);
    let print_str = HostBinding::new(
        "print_str",
        FuncType::from_tags("v", "ii").unwrap_or_default(),
        move |memory, args, _| {
            let ptr = args.first().and_then(Value::as_i32).unwrap_or_default() as u32;
            let len = args.get(1).and_then(Value::as_i32).unwrap_or_default() as u32;
            let text = read_guest_str(memory, ptr, len)?;
            emit(&str_out, &text)
        },
    );

    vec![
        print_value(out, "print_i32", "i", |v| {
            v.as_i32().map(|n| n.to_string()).unwrap_or_default()
        }),
        print_value(out, "print_i64", "I", |v| {
            v.as_i64().map(|n| n.to_string()).unwrap_or_default()
        }),
        print_value(out, "print_f32", "f", |v| {
            v.as_f32().map(|n| n.to_string()).unwrap_or_default()
        }),
        print_value(out, "print_f64", "d", |v| {
            v.as_f64().map(|n| n.to_string()).unwrap_or_default()
        }),
        print_str,
    ]
}
