//! Test suites for the Cota link engine.

pub(crate) mod support;
