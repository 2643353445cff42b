mod merge_engine;

pub use merge_engine::MergeEngine;
