pub mod config;
pub mod logging;

// Pipeline: manifest → task queue → worker pool → fetch / storage.
pub mod batch;
pub mod fetch;
pub mod manifest;
pub mod outcome;
pub mod pool;
pub mod storage;
pub mod task;
