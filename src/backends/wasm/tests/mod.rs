mod encode_tests;
mod execution_tests;
