use crate::anchor;
use crate::comments::Comment;
use crate::geometry::{self, Point};
use crate::page::PageEnvironment;

/// Hit radius around a pin center, half the rendered pin diameter.
pub const PIN_HIT_RADIUS: f64 = 12.0;

/// One rendered pin: a comment projected into viewport coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PinMarker {
    pub comment_id: String,
    /// Viewport position of the pin center.
    pub position: Point,
    /// 1-based display rank. A rank, not an identity: inserting an earlier
    /// comment shifts the ranks behind it.
    pub index: usize,
    /// Comment text, for tooltips and accessible labels.
    pub text: String,
}

/// The pending pin shown between the placement click and save.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPin {
    pub position: Point,
    pub index: usize,
}

/// Marker layout plus the ephemeral preview pin.
///
/// The preview lives outside the marker list, so re-rendering the committed
/// set never drops a preview the user is still editing behind.
#[derive(Debug, Default)]
pub struct PinLayer {
    markers: Vec<PinMarker>,
    preview: Option<PreviewPin>,
}

impl PinLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every marker from live page state. Positions come from
    /// anchor resolution, shifted by the current scroll offset.
    pub fn render(&mut self, env: &dyn PageEnvironment, comments: &[Comment]) {
        let scroll = geometry::scroll_or_origin(env);
        self.markers = comments
            .iter()
            .enumerate()
            .map(|(i, comment)| {
                let absolute = anchor::resolve_position(env, comment);
                PinMarker {
                    comment_id: comment.id.clone(),
                    position: Point::new(absolute.x - scroll.x, absolute.y - scroll.y),
                    index: i + 1,
                    text: comment.text.clone(),
                }
            })
            .collect();
        log::debug!("Rendered {} pin markers", self.markers.len());
    }

    pub fn markers(&self) -> &[PinMarker] {
        &self.markers
    }

    pub fn preview(&self) -> Option<&PreviewPin> {
        self.preview.as_ref()
    }

    pub fn show_preview(&mut self, position: Point, index: usize) {
        self.preview = Some(PreviewPin { position, index });
    }

    pub fn clear_preview(&mut self) {
        self.preview = None;
    }

    /// Drop all markers and any preview, for teardown and page switches.
    pub fn clear(&mut self) {
        self.markers.clear();
        self.preview = None;
    }

    /// Topmost marker under a viewport point. Clicks that hit a marker are
    /// consumed by the overlay instead of placing a new comment.
    pub fn marker_at(&self, client: Point) -> Option<&PinMarker> {
        self.markers.iter().rev().find(|marker| {
            (marker.position.x - client.x).hypot(marker.position.y - client.y) <= PIN_HIT_RADIUS
        })
    }
}
