//! Artwork content: model, upstream adapters, weighted fetching and rotation

pub mod fetcher;
pub mod rotation;
pub mod sources;
pub mod types;

pub use fetcher::{ContentFetcher, FetchSettings, RetryError, RetryPolicy, SourceWeight, WeightTable};
pub use rotation::{rotation_slot, RotationCategory, RotationEntry, RotationManager};
pub use types::{
    CandidateQuery, ContentError, ContentFilters, ContentItem, ContentPool, ContentSource,
    ItemIdentity, Orientation, RawItem, SharedSource, SourceError, SourceKey,
};
