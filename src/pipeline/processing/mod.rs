// Pipeline processing: normalize, deduplicate, merge, enrich, reconcile

pub mod dedup;
pub mod enrich;
pub mod merge;
pub mod normalize;
pub mod reconcile;
