mod cache_test;
mod filesystem_test;
mod pipeline_test;
