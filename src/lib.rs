// Export modules for use in tests
pub mod anchor;
pub mod comments;
pub mod geometry;
pub mod overlay;
pub mod page;
pub mod pins;
pub mod selector;
pub mod static_page;

pub mod test_utils;

// Re-export main overlay components
pub use overlay::{ClickOutcome, CommentOverlay, OverlayConfig};
