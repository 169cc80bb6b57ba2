mod cache_test;
mod counter_test;
mod fan_test;
mod leak_test;
mod pipeline_test;
mod pool_test;
mod rate_limit_test;
mod semaphore_test;
