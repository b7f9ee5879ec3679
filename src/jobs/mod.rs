/// Background jobs spawned alongside the HTTP server

mod purge;

pub use purge::{run_purge_once, spawn_purge_job};
