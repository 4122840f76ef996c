pub mod adapters;
pub mod detector;
pub mod matcher;
pub mod store;
pub mod template;

pub use adapters::{get_adapters, Adapters};
pub use detector::{
    detect_save_paths, Candidate, DetectionProgress, DetectionRequest, DetectionResult,
    DetectionStatus,
};
pub use store::CatalogStore;
