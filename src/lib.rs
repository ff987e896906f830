//! # Thicket
//!
//! Lowers nested functions and nested aggregates to code with an explicit static chain.
//! Variables captured from enclosing functions live in heap or stack frames, every frame
//! links to the frame above it, and every use site walks that chain to reach what it needs.
//!
//! ```text
//! DeclTree → capture analysis → frame layouts → allocation plan → LIR → (Wasm | interpreter)
//! ```

pub mod backends;
pub mod compiler_frontend;
pub mod projects;
pub mod runtime;

pub mod build_system {
    pub mod build;
    pub mod core_build;
}

pub use build_system::core_build::{CompiledUnit, compile_unit};
