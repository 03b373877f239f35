//! Connection-establishment retry.

pub mod retry;
