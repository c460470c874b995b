//! Request and response types.

pub mod chat;
