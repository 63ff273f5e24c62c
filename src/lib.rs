// Hand Scorer - Core Library
// Landmark scoring engine for hand X-rays: registry, repository, layout,
// side cache and session controller. The terminal UI lives in the binary.

pub mod landmarks;
pub mod error;
pub mod repository;
pub mod layout;
pub mod side_cache;
pub mod case_list;
pub mod session;

// Re-export commonly used types
pub use landmarks::{
    Landmark, Scheme, Score, Side,
    REFERENCE_HEIGHT, REFERENCE_WIDTH,
};
pub use error::{Result, ScorerError};
pub use repository::{
    CaseMetadata, CaseProgress, ExportRow, ScoreMap, ScoreRecord, ScoreRepository,
    SessionFile, empty_scores,
};
pub use layout::{
    place, LayoutEngine, Placement, Point, Rect, Size,
};
pub use side_cache::{CacheSnapshot, ControlPanel, SideCache};
pub use case_list::{scan_folder, is_supported_image, SUPPORTED_EXTENSIONS};
pub use session::{FileProbe, ImageDisplay, SessionController};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
