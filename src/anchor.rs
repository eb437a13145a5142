use crate::geometry::{self, clamp01, Point};
use crate::page::{PageEnvironment, WidgetBoundary};
use crate::selector::generate_selector;
use serde::{Deserialize, Serialize};

/// Durable position descriptor captured at click time.
///
/// `page_x`/`page_y` are the frozen absolute coordinates and are always
/// present; they serialize as plain `x`/`y`, the stored comment format. The
/// optional layers add document-normalized coordinates and an element anchor
/// with per-axis fractional offsets. Offsets only appear together with the
/// selector, and an axis whose offset could not be computed simply stays
/// unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorDescriptor {
    #[serde(rename = "x")]
    pub page_x: f64,
    #[serde(rename = "y")]
    pub page_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_offset_y: Option<f64>,
}

impl AnchorDescriptor {
    /// Descriptor with only the frozen page coordinates populated.
    pub fn at_page(page: Point) -> Self {
        Self {
            page_x: page.x,
            page_y: page.y,
            ..Self::default()
        }
    }
}

/// A placement click: the absolute page point plus the viewport-relative
/// point the input event reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub page: Point,
    pub client: Point,
}

impl ClickEvent {
    pub fn new(page: Point, client: Point) -> Self {
        Self { page, client }
    }

    /// Click at a viewport point, with the page point derived from the
    /// current scroll offset.
    pub fn at_client(env: &dyn PageEnvironment, client: Point) -> Self {
        let scroll = geometry::scroll_or_origin(env);
        Self {
            page: Point::new(client.x + scroll.x, client.y + scroll.y),
            client,
        }
    }
}

/// Anything carrying an [`AnchorDescriptor`]. The descriptor's frozen page
/// coordinates double as the guaranteed fallback, so resolution always has
/// an answer.
pub trait Anchorable {
    fn anchor(&self) -> &AnchorDescriptor;
}

impl Anchorable for AnchorDescriptor {
    fn anchor(&self) -> &AnchorDescriptor {
        self
    }
}

/// Capture a descriptor for a click.
///
/// Records the page coordinates unconditionally, normalized coordinates when
/// the document reports a positive extent on an axis, and an element anchor
/// when the click lands on an element outside the widget's own chrome.
/// Deterministic, side-effect free, and never fails: every shortfall leaves
/// the affected fields unset and resolution degrades through the remaining
/// layers.
pub fn build_anchor(
    env: &dyn PageEnvironment,
    boundary: &WidgetBoundary,
    event: ClickEvent,
) -> AnchorDescriptor {
    let mut descriptor = AnchorDescriptor::at_page(event.page);

    if let Some(content) = env.content_size() {
        if content.width > 0.0 {
            descriptor.norm_x = Some(event.page.x / content.width);
        }
        if content.height > 0.0 {
            descriptor.norm_y = Some(event.page.y / content.height);
        }
    }

    let Some(target) = env.element_at(event.client) else {
        return descriptor;
    };
    if boundary.owns(env, target) {
        return descriptor;
    }
    let Some(selector) = generate_selector(env, target) else {
        return descriptor;
    };

    descriptor.anchor_selector = Some(selector);
    if let Some(rect) = env.bounding_rect(target) {
        if rect.width > 0.0 {
            descriptor.anchor_offset_x =
                clamp01(Some((event.client.x - rect.left) / rect.width));
        }
        if rect.height > 0.0 {
            descriptor.anchor_offset_y =
                clamp01(Some((event.client.y - rect.top) / rect.height));
        }
    }
    descriptor
}

/// Re-derive the absolute document position for an anchored item.
///
/// Each axis walks its redundancy chain independently: the anchor element
/// with the stored offset, then the document-normalized coordinate, then the
/// frozen page coordinate. Everything is recomputed from live page state on
/// every call; nothing is cached, and a lookup that fails on one axis falls
/// through without disturbing the other.
pub fn resolve_position<A: Anchorable + ?Sized>(env: &dyn PageEnvironment, item: &A) -> Point {
    let descriptor = item.anchor();
    let scroll = geometry::scroll_or_origin(env);
    let content = env.content_size();

    // One lookup serves both axes; the first match in document order is used
    // deterministically even when the selector is ambiguous.
    let anchored = descriptor
        .anchor_selector
        .as_deref()
        .and_then(|selector| env.query_selector(selector))
        .and_then(|node| env.bounding_rect(node));

    Point {
        x: resolve_axis(
            anchored.map(|rect| (rect.left, rect.width)),
            descriptor.anchor_offset_x,
            descriptor.norm_x,
            content.map(|c| c.width),
            scroll.x,
            descriptor.page_x,
        ),
        y: resolve_axis(
            anchored.map(|rect| (rect.top, rect.height)),
            descriptor.anchor_offset_y,
            descriptor.norm_y,
            content.map(|c| c.height),
            scroll.y,
            descriptor.page_y,
        ),
    }
}

fn resolve_axis(
    anchored: Option<(f64, f64)>,
    offset: Option<f64>,
    norm: Option<f64>,
    content_extent: Option<f64>,
    scroll: f64,
    frozen: f64,
) -> f64 {
    if let (Some((edge, size)), Some(offset)) = (anchored, offset) {
        if size > 0.0 {
            return edge + size * offset + scroll;
        }
    }
    if let (Some(norm), Some(extent)) = (norm, content_extent) {
        if extent > 0.0 {
            return norm * extent;
        }
    }
    frozen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Size};
    use crate::static_page::StaticPage;

    fn simple_page() -> (StaticPage, crate::page::NodeId) {
        let mut page = StaticPage::new(Size::new(800.0, 600.0), Size::new(1200.0, 3000.0));
        let body = page.add_element(None, "body", Rect::new(0.0, 0.0, 1200.0, 3000.0));
        let card = page.add_element(Some(body), "div", Rect::new(100.0, 550.0, 200.0, 100.0));
        page.set_attribute(card, "id", "card");
        (page, card)
    }

    #[test]
    fn capture_records_all_layers() {
        let (page, _) = simple_page();
        page.set_scroll(Point::new(0.0, 500.0));

        let event = ClickEvent::at_client(&page, Point::new(120.0, 80.0));
        assert_eq!(event.page, Point::new(120.0, 580.0));

        let descriptor = build_anchor(&page, &WidgetBoundary::new(), event);
        assert_eq!(descriptor.page_x, 120.0);
        assert_eq!(descriptor.page_y, 580.0);
        assert_eq!(descriptor.norm_x, Some(120.0 / 1200.0));
        assert_eq!(descriptor.norm_y, Some(580.0 / 3000.0));
        assert_eq!(descriptor.anchor_selector.as_deref(), Some("#card"));
        assert_eq!(descriptor.anchor_offset_x, Some(0.1));
        assert_eq!(descriptor.anchor_offset_y, Some(0.3));
    }

    #[test]
    fn capture_without_element_keeps_coordinate_layers() {
        let (page, _) = simple_page();
        page.set_scroll(Point::new(0.0, 500.0));

        // Nothing occupies the far right of the viewport.
        let event = ClickEvent::at_client(&page, Point::new(1900.0, 80.0));
        let descriptor = build_anchor(&page, &WidgetBoundary::new(), event);

        assert!(descriptor.anchor_selector.is_none());
        assert!(descriptor.anchor_offset_x.is_none());
        assert!(descriptor.anchor_offset_y.is_none());
        assert!(descriptor.norm_x.is_some());
        assert_eq!(descriptor.page_x, 1900.0);
    }

    #[test]
    fn capture_ignores_widget_owned_elements() {
        let (mut page, card) = simple_page();
        let toolbar = page.add_element(Some(card), "button", Rect::new(110.0, 560.0, 40.0, 20.0));
        let mut boundary = WidgetBoundary::new();
        boundary.register(card);
        page.set_scroll(Point::new(0.0, 500.0));

        // The click lands on widget chrome, so no element anchor is taken.
        let event = ClickEvent::at_client(&page, Point::new(120.0, 70.0));
        assert_eq!(page.element_at(event.client), Some(toolbar));

        let descriptor = build_anchor(&page, &boundary, event);
        assert!(descriptor.anchor_selector.is_none());
        assert_eq!(descriptor.page_x, 120.0);
    }

    #[test]
    fn zero_width_axis_leaves_that_offset_unset() {
        let mut page = StaticPage::new(Size::new(800.0, 600.0), Size::new(800.0, 600.0));
        let rule = page.add_element(None, "hr", Rect::new(50.0, 100.0, 0.0, 40.0));
        page.set_attribute(rule, "id", "rule");

        let event = ClickEvent::at_client(&page, Point::new(50.0, 110.0));
        let descriptor = build_anchor(&page, &WidgetBoundary::new(), event);

        assert_eq!(descriptor.anchor_selector.as_deref(), Some("#rule"));
        assert_eq!(descriptor.anchor_offset_x, None);
        assert_eq!(descriptor.anchor_offset_y, Some(0.25));
    }

    #[test]
    fn resolution_follows_the_moved_element() {
        let (mut page, card) = simple_page();
        page.set_scroll(Point::new(0.0, 500.0));
        let descriptor = build_anchor(
            &page,
            &WidgetBoundary::new(),
            ClickEvent::at_client(&page, Point::new(120.0, 80.0)),
        );

        // Reflow: the card drops 300px down the page.
        page.set_rect(card, Rect::new(100.0, 850.0, 200.0, 100.0));
        let resolved = resolve_position(&page, &descriptor);
        assert_eq!(resolved, Point::new(120.0, 880.0));
    }

    #[test]
    fn axes_degrade_independently() {
        let mut page = StaticPage::new(Size::new(800.0, 600.0), Size::new(1000.0, 2000.0));
        let strip = page.add_element(None, "div", Rect::new(0.0, 300.0, 0.0, 100.0));
        page.set_attribute(strip, "id", "strip");

        let descriptor = AnchorDescriptor {
            page_x: 40.0,
            page_y: 330.0,
            norm_x: Some(0.5),
            norm_y: Some(330.0 / 2000.0),
            anchor_selector: Some("#strip".to_string()),
            anchor_offset_x: None,
            anchor_offset_y: Some(0.3),
        };

        let resolved = resolve_position(&page, &descriptor);
        // X has no offset, so it uses the normalized coordinate; Y anchors.
        assert_eq!(resolved.x, 500.0);
        assert_eq!(resolved.y, 330.0);
    }

    #[test]
    fn resolution_is_idempotent() {
        let (page, _) = simple_page();
        let descriptor = build_anchor(
            &page,
            &WidgetBoundary::new(),
            ClickEvent::at_client(&page, Point::new(150.0, 570.0)),
        );

        let first = resolve_position(&page, &descriptor);
        let second = resolve_position(&page, &descriptor);
        assert_eq!(first, second);
    }

    #[test]
    fn wire_format_matches_stored_comments() {
        let descriptor = AnchorDescriptor {
            page_x: 120.0,
            page_y: 580.0,
            norm_x: Some(0.1),
            norm_y: None,
            anchor_selector: Some("#card".to_string()),
            anchor_offset_x: Some(0.1),
            anchor_offset_y: Some(0.3),
        };

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "x": 120.0,
                "y": 580.0,
                "normX": 0.1,
                "anchorSelector": "#card",
                "anchorOffsetX": 0.1,
                "anchorOffsetY": 0.3,
            })
        );

        // Legacy records carry only the frozen coordinates.
        let legacy: AnchorDescriptor = serde_json::from_str(r#"{"x": 5.0, "y": 7.0}"#).unwrap();
        assert_eq!(legacy.page_x, 5.0);
        assert_eq!(legacy.norm_x, None);
        assert_eq!(legacy.anchor_selector, None);
    }
}
