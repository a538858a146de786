//! Filter composition: criteria and per-element classification.

pub mod criteria;
pub mod classify;

pub use criteria::{FilterCriteria, FilterPatch, TimeWindow};
pub use classify::{classify, classify_entity, Classification, ClassificationMap, Visibility, VisualClass};
