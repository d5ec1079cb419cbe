pub mod result_cache;
pub mod rule_locks;

pub use result_cache::ResultCache;
pub use rule_locks::RuleLocks;
