use crate::geometry::{Point, Rect, Size};
use std::collections::HashSet;

/// Opaque handle to an element inside a [`PageEnvironment`].
///
/// Handles are only meaningful to the environment that issued them and may go
/// stale when the page mutates; every accessor returns `Option` for that
/// reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Wraps an index into whatever node table the environment keeps.
    /// Embedders mint handles here when answering [`PageEnvironment`] calls.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw index, for looking the node back up in that table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Trait for abstracting page access so anchoring runs without a browser.
///
/// A real embedding backs this with live DOM queries; tests and the inspector
/// binary use [`crate::static_page::StaticPage`]. Accessors for viewport,
/// scroll and content size return `None` in restricted environments; callers
/// go through the [`crate::geometry`] helpers for safe defaults.
pub trait PageEnvironment {
    /// Visible viewport size, if the environment can report one.
    fn viewport_size(&self) -> Option<Size>;

    /// Current scroll offset of the page.
    fn scroll_offset(&self) -> Option<Point>;

    /// Full scrollable extent of the document.
    fn content_size(&self) -> Option<Size>;

    /// Topmost element at a viewport-coordinate point.
    fn element_at(&self, client: Point) -> Option<NodeId>;

    /// First element matching a CSS selector, in document order.
    fn query_selector(&self, selector: &str) -> Option<NodeId>;

    /// Bounding box of an element in viewport coordinates.
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Element children in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Best-effort scroll request. Implementations swallow failures; callers
    /// never observe an error.
    fn scroll_to(&self, target: Point);

    /// Full page URL, fragment included. Partitioning strips the fragment via
    /// [`normalize_page_url`].
    fn page_url(&self) -> Option<String>;
}

/// The set of page nodes the widget itself has mounted.
///
/// A click on one of these nodes (or any of its descendants) is the widget's
/// own chrome and must never produce an anchor. Ownership is checked by
/// walking parents up to a registered root, so embedders only register the
/// roots they mount.
#[derive(Debug, Clone, Default)]
pub struct WidgetBoundary {
    roots: HashSet<NodeId>,
}

impl WidgetBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, root: NodeId) {
        self.roots.insert(root);
    }

    pub fn unregister(&mut self, root: NodeId) {
        self.roots.remove(&root);
    }

    pub fn owns(&self, env: &dyn PageEnvironment, node: NodeId) -> bool {
        if self.roots.is_empty() {
            return false;
        }
        let mut current = Some(node);
        while let Some(n) = current {
            if self.roots.contains(&n) {
                return true;
            }
            current = env.parent(n);
        }
        false
    }
}

/// Partition key for comments: the page URL with its fragment removed.
pub fn normalize_page_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        // Not a parseable URL (file paths, test fixtures): strip the fragment
        // textually.
        Err(_) => match raw.split_once('#') {
            Some((base, _)) => base.to_string(),
            None => raw.to_string(),
        },
    }
}
