//! Library half of the `stepwise` binary, so the commands can be exercised
//! from integration tests.

pub mod commands;
