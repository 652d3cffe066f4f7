mod invitation_cache_redis;

pub use invitation_cache_redis::*;
