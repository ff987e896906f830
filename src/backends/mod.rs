pub mod lir;
pub mod nested_context;
pub mod wasm;
