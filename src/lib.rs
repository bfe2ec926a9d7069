//! LFA: Lost & Found Admin
//!
//! Admin console for a lost & found listing app: a local cache of the
//! remote collections, search and facet filtering over that cache, and
//! confirmed delete / role actions against the hosted document store.

pub mod cli;
pub mod core;
