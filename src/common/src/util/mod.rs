pub mod common_test_util;
