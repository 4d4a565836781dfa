#![forbid(unsafe_code)]
//! Filesystem, hashing, and process-execution helpers shared by every
//! crate in the workspace that isn't purely data-model (`k6box-version`)
//! or purely domain logic (`k6box-deps`, `k6box-resolver`).

pub mod error;
pub mod fs;
pub mod hash;
pub mod process;
