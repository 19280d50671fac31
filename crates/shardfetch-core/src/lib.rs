pub mod config;
pub mod logging;

pub mod control;
pub mod coordinator;
pub mod fetch;
pub mod layout;
pub mod ledger;
pub mod probe;
pub mod progress;
pub mod shard;
pub mod tools;
pub mod work;
