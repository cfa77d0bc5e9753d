//! Tarn compiler as a WebAssembly module.
//!
//! Besides the native CLI, this crate builds into a WebAssembly module
//! that hosts drive through a minimal pointer contract:
//!
//! ```bash
//! cargo build -p tarnc --lib --target wasm32-unknown-unknown --release
//! ```
//!
//! The host writes the source bytes into the exported `memory`, calls
//! `run(input_ptr, input_len)`, and reads the reply at the returned
//! pointer: an unsigned little-endian 32-bit length followed by that many
//! bytes. On success the payload is the compiled module; on failure it is
//! the ASCII text `error: <error-kind-name>`. The reply region is reused
//! across calls, so `run` must not be called re-entrantly.

/// Frame a reply payload: little-endian u32 length, then the bytes.
fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Compile one input and produce the framed reply of the host contract.
///
/// This is the target-independent half of the `run` export, kept separate
/// so native tests can exercise the contract.
pub fn respond(input: &[u8]) -> Vec<u8> {
    let payload = match std::str::from_utf8(input) {
        Ok(source) => match tarn_core::compile(source) {
            Ok(module) => module,
            Err(e) => format!("error: {}", e.kind_name()).into_bytes(),
        },
        Err(_) => b"error: ParseError".to_vec(),
    };
    frame(&payload)
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use tarn_core::CompileError;

    /// Reply region, reused across calls.
    const OUTPUT_CAPACITY: usize = 1 << 20;
    static mut OUTPUT: [u8; OUTPUT_CAPACITY] = [0; OUTPUT_CAPACITY];

    /// wasmexec entrypoint.
    ///
    /// # Safety
    ///
    /// The host must have written `len` bytes at `ptr`, and must not call
    /// `run` re-entrantly; the reply region is process-wide.
    #[no_mangle]
    pub unsafe extern "C" fn run(ptr: *const u8, len: u32) -> *const u8 {
        let input = core::slice::from_raw_parts(ptr, len as usize);
        let mut reply = super::respond(input);
        if reply.len() > OUTPUT_CAPACITY {
            reply = super::frame(
                format!("error: {}", CompileError::OutOfMemory.kind_name()).as_bytes(),
            );
        }
        let out = &mut *core::ptr::addr_of_mut!(OUTPUT);
        out[..reply.len()].copy_from_slice(&reply);
        out.as_ptr()
    }
}
