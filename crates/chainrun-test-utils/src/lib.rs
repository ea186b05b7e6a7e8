//! Stubs and fixtures shared by chainrun tests.

pub mod fixtures;
mod stub;

pub use stub::StubGenerator;
