mod allocation_tests;
mod capture_analysis_tests;
mod frame_layout_tests;
