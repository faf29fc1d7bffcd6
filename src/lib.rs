//! tex-math parses a large subset of LaTeX mathematical notation into an
//! abstract syntax tree suitable for equivalence checking, rendering and
//! symbolic manipulation.
//!
//! The core lives in [`math_interpreter`]: a scanner, a recursive-descent
//! operator-precedence parser and a content-addressable intern pool.

#[macro_use]
extern crate log;

pub mod config;
pub mod math_interpreter;
pub mod utils;
