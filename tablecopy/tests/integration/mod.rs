#![cfg(feature = "test-utils")]

mod copy_test;
