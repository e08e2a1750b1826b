//! Host introspection helpers

pub mod cpuinfo;
