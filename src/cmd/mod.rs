//! Command line definitions for the `mrt` binary.

pub mod mrt;
