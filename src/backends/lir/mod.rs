pub mod build_lir;
pub mod context;
pub mod emitter;
pub mod lir_nodes;

mod expressions;
mod lir_display;
mod statements;

#[cfg(test)]
mod tests;
