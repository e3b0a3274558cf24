//! Utility functions

pub(crate) mod fs;
