//! # WASM Codegen
//!
//! Turns a lowered `LirModule` into a WebAssembly binary.
//!
//! ```text
//! LirModule → memory setup → function types → bodies → exports → validation → bytes
//! ```
//!
//! Frames and instances live in linear memory (see `memory`). Heap frames come from a bump
//! allocator; stack frames come from a shadow stack that each function pops on return.

pub mod encode;
pub mod memory;
pub mod module_builder;
pub mod validator;

#[cfg(test)]
mod tests;
