pub mod decl_builder;
pub mod decl_nodes;
pub mod decl_tree;
pub mod program_file;
pub mod references;

mod decl_display;

#[cfg(test)]
pub(crate) mod tests;
