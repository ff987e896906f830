
mod decl_tree_tests;
