use crate::anchor::{self, AnchorDescriptor, ClickEvent};
use crate::comments::{Comment, CommentInput, CommentStore, StoreConfig, DEFAULT_AUTHOR};
use crate::geometry::{self, Point, DEFAULT_MODAL_SIZE, VIEWPORT_MARGIN};
use crate::page::{normalize_page_url, NodeId, PageEnvironment, WidgetBoundary};
use crate::pins::{PinLayer, PinMarker, PreviewPin};
use std::time::Duration;

/// Re-render delays applied after a comment load. Late-mounting content
/// (lazy sections, client-side route mounts) gets its anchors picked up by
/// one of these passes. The embedder owns the timers and calls
/// [`CommentOverlay::retry_positions`] per delay.
pub const POSITION_RETRY_DELAYS: [Duration; 5] = [
    Duration::from_millis(100),
    Duration::from_millis(300),
    Duration::from_millis(600),
    Duration::from_millis(1000),
    Duration::from_millis(2000),
];

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Author recorded on new comments until changed at runtime.
    pub author_name: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            author_name: DEFAULT_AUTHOR.to_string(),
        }
    }
}

/// Open editor state between a placement click and save/cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    /// Descriptor captured at the placement click, saved with the comment.
    pub anchor: AnchorDescriptor,
    /// Top-left of the editor panel, viewport coordinates.
    pub position: Point,
}

/// Where a focused comment's detail modal goes.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusTarget {
    pub comment_id: String,
    /// 1-based display rank of the comment at focus time.
    pub index: usize,
    /// Resolved pin position, viewport coordinates (post-scroll when the
    /// focus had to scroll).
    pub anchor: Point,
    /// Top-left of the detail modal, viewport coordinates.
    pub modal: Point,
    /// Whether focusing scrolled the page to reach the pin.
    pub scrolled: bool,
}

/// What a click ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The click fell through to the page untouched.
    Ignored,
    /// A pin marker consumed the click and its comment got focused.
    FocusedPin(FocusTarget),
    /// A placement click captured an anchor and opened the editor.
    EditorOpened,
}

/// Orchestrates the widget: comment mode, anchor capture on click, the
/// editor session, pin rendering batched per animation frame, the drawer
/// and detail modal, and page URL switches.
///
/// Everything runs on the embedder's single event loop. The overlay never
/// touches timers or frames itself: the embedder forwards clicks and escape
/// presses, drives [`on_frame`](Self::on_frame) when
/// [`render_pending`](Self::render_pending) says so, and schedules
/// [`retry_positions`](Self::retry_positions) per [`POSITION_RETRY_DELAYS`].
pub struct CommentOverlay {
    author_name: String,
    store: Box<dyn CommentStore>,
    boundary: WidgetBoundary,
    pins: PinLayer,
    comments: Vec<Comment>,
    comment_mode: bool,
    render_scheduled: bool,
    drawer_open: bool,
    editor: Option<EditorSession>,
    focused: Option<FocusTarget>,
    page_url: String,
    current_full_url: String,
}

impl CommentOverlay {
    pub fn new(config: OverlayConfig, store: Box<dyn CommentStore>) -> Self {
        Self {
            author_name: config.author_name,
            store,
            boundary: WidgetBoundary::new(),
            pins: PinLayer::new(),
            comments: Vec::new(),
            comment_mode: false,
            render_scheduled: false,
            drawer_open: false,
            editor: None,
            focused: None,
            page_url: String::new(),
            current_full_url: String::new(),
        }
    }

    /// Bind to a page: record its URL, load its comments and render once.
    pub fn attach(&mut self, env: &dyn PageEnvironment) {
        self.current_full_url = env.page_url().unwrap_or_default();
        self.page_url = normalize_page_url(&self.current_full_url);
        self.load_comments(env);
        log::info!(
            "Overlay attached to {} with {} comments",
            self.page_url,
            self.comments.len()
        );
    }

    /// Register a page node the embedder mounted as widget chrome. Clicks on
    /// it (or its descendants) never place comments.
    pub fn register_widget_root(&mut self, node: NodeId) {
        self.boundary.register(node);
    }

    pub fn unregister_widget_root(&mut self, node: NodeId) {
        self.boundary.unregister(node);
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn set_author_name(&mut self, name: impl Into<String>) {
        self.author_name = name.into();
    }

    /// Snapshot of the current comments, oldest first.
    pub fn list_comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Count for the toolbar badge.
    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn is_comment_mode(&self) -> bool {
        self.comment_mode
    }

    pub fn is_drawer_open(&self) -> bool {
        self.drawer_open
    }

    pub fn editor(&self) -> Option<&EditorSession> {
        self.editor.as_ref()
    }

    pub fn focused(&self) -> Option<&FocusTarget> {
        self.focused.as_ref()
    }

    pub fn markers(&self) -> &[PinMarker] {
        self.pins.markers()
    }

    pub fn preview(&self) -> Option<&PreviewPin> {
        self.pins.preview()
    }

    /// Replace the store configuration and reload from the new backend.
    pub fn configure_store(&mut self, env: &dyn PageEnvironment, config: StoreConfig) {
        self.store.update_config(config);
        self.load_comments(env);
    }

    /// Fetch the page's comments, replacing the snapshot wholesale, and
    /// render immediately.
    pub fn load_comments(&mut self, env: &dyn PageEnvironment) {
        self.comments = self.store.fetch_comments(&self.page_url);
        log::debug!(
            "Loaded {} comments for {}",
            self.comments.len(),
            self.page_url
        );
        self.pins.render(env, &self.comments);
    }

    pub fn enable_comment_mode(&mut self) {
        self.drawer_open = false;
        self.comment_mode = true;
    }

    /// Leave comment mode entirely: editor closed, preview gone.
    pub fn disable_comment_mode(&mut self) {
        self.comment_mode = false;
        self.editor = None;
        self.pins.clear_preview();
    }

    pub fn toggle_comment_mode(&mut self) {
        if self.comment_mode {
            self.disable_comment_mode();
        } else {
            self.enable_comment_mode();
        }
    }

    pub fn toggle_drawer(&mut self) {
        if self.drawer_open {
            self.drawer_open = false;
        } else {
            self.disable_comment_mode();
            self.drawer_open = true;
        }
    }

    pub fn close_modal(&mut self) {
        self.focused = None;
    }

    /// Route a page click.
    ///
    /// Pin markers always win and focus their comment, whatever the mode.
    /// Otherwise placement only happens in comment mode, outside the
    /// widget's own chrome: the anchor is captured, the preview pin appears
    /// at the click point, the mode visuals drop (the editor stays open),
    /// and an editor session starts next to the click.
    pub fn handle_click(&mut self, env: &dyn PageEnvironment, event: ClickEvent) -> ClickOutcome {
        let hit = self
            .pins
            .marker_at(event.client)
            .map(|marker| marker.comment_id.clone());
        if let Some(comment_id) = hit {
            return match self.focus_comment(env, &comment_id) {
                Some(target) => ClickOutcome::FocusedPin(target),
                None => ClickOutcome::Ignored,
            };
        }

        if !self.comment_mode {
            return ClickOutcome::Ignored;
        }
        if let Some(target) = env.element_at(event.client) {
            if self.boundary.owns(env, target) {
                return ClickOutcome::Ignored;
            }
        }

        let descriptor = anchor::build_anchor(env, &self.boundary, event);
        let preview_index = self.comments.len() + 1;
        self.pins.show_preview(event.client, preview_index);

        // The crosshair mode ends at placement, but the editor stays open.
        self.comment_mode = false;

        let viewport = geometry::viewport_or_default(env);
        self.editor = Some(EditorSession {
            anchor: descriptor,
            position: geometry::modal_position(event.client, DEFAULT_MODAL_SIZE, viewport),
        });
        log::debug!(
            "Preview pin {} placed at ({}, {})",
            preview_index,
            event.client.x,
            event.client.y
        );
        ClickOutcome::EditorOpened
    }

    /// Save the open editor's text as a comment.
    ///
    /// Blank text is refused and the editor stays open. On success the
    /// preview pin is dropped, the comment is appended to the snapshot and
    /// a render is scheduled.
    pub fn submit_editor(&mut self, text: &str) -> Option<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let session = self.editor.take()?;
        self.pins.clear_preview();

        let comment = self.store.create_comment(
            CommentInput {
                text: text.to_string(),
                page_url: self.page_url.clone(),
                anchor: session.anchor,
            },
            &self.author_name,
        );
        // The snapshot is swapped out whole on append, as on load.
        let mut next = self.comments.clone();
        next.push(comment.clone());
        self.comments = next;
        self.schedule_render();
        Some(comment)
    }

    /// Abandon the open editor and its preview pin.
    pub fn cancel_editor(&mut self) {
        self.pins.clear_preview();
        self.editor = None;
    }

    /// Escape presses work through the open surfaces one at a time: editor,
    /// drawer, comment mode, then the detail modal. Returns whether the key
    /// was consumed.
    pub fn handle_escape(&mut self) -> bool {
        if self.editor.is_some() {
            self.cancel_editor();
            self.disable_comment_mode();
            return true;
        }
        if self.drawer_open {
            self.drawer_open = false;
            return true;
        }
        if self.comment_mode {
            self.disable_comment_mode();
            return true;
        }
        if self.focused.is_some() {
            self.focused = None;
            return true;
        }
        false
    }

    /// Coalesce render requests within a frame; the actual work happens in
    /// [`on_frame`](Self::on_frame).
    pub fn schedule_render(&mut self) {
        if self.render_scheduled {
            return;
        }
        self.render_scheduled = true;
    }

    pub fn render_pending(&self) -> bool {
        self.render_scheduled
    }

    /// Animation-frame callback. Clears the scheduled flag before rendering
    /// so work triggered by the render coalesces into the next frame, then
    /// recomputes every pin from live page state.
    pub fn on_frame(&mut self, env: &dyn PageEnvironment) -> &[PinMarker] {
        self.render_scheduled = false;
        self.pins.render(env, &self.comments);
        self.pins.markers()
    }

    /// One pass of the post-load retry schedule. Re-renders only while
    /// comments exist and the page URL has not moved on; returns whether a
    /// render happened.
    pub fn retry_positions(&mut self, env: &dyn PageEnvironment) -> bool {
        if self.comments.is_empty() {
            return false;
        }
        let current = normalize_page_url(&env.page_url().unwrap_or_default());
        if current != self.page_url {
            return false;
        }
        self.pins.render(env, &self.comments);
        true
    }

    /// Focus a comment: resolve it, scroll it into view when it sits outside
    /// the viewport margin, and place the detail modal next to it using the
    /// post-scroll offset.
    pub fn focus_comment(
        &mut self,
        env: &dyn PageEnvironment,
        comment_id: &str,
    ) -> Option<FocusTarget> {
        let position = self.comments.iter().position(|c| c.id == comment_id)?;
        let comment = &self.comments[position];

        let absolute = anchor::resolve_position(env, comment);
        let scroll = geometry::scroll_or_origin(env);
        let viewport = geometry::viewport_or_default(env);
        let mut in_view = Point::new(absolute.x - scroll.x, absolute.y - scroll.y);

        let scrolled = !geometry::is_in_viewport(in_view, viewport, VIEWPORT_MARGIN);
        if scrolled {
            geometry::request_scroll(env, geometry::scroll_target(absolute, viewport));
            let after = geometry::scroll_or_origin(env);
            in_view = Point::new(absolute.x - after.x, absolute.y - after.y);
        }

        let target = FocusTarget {
            comment_id: comment_id.to_string(),
            index: position + 1,
            anchor: in_view,
            modal: geometry::modal_position(in_view, DEFAULT_MODAL_SIZE, viewport),
            scrolled,
        };
        log::debug!("Focused comment {} (scrolled: {})", comment_id, scrolled);
        self.focused = Some(target.clone());
        Some(target)
    }

    /// React to a page URL change (client-side routing). Open surfaces are
    /// closed and comments are reloaded for the new partition. Returns
    /// whether the URL actually changed.
    pub fn handle_url_change(&mut self, env: &dyn PageEnvironment) -> bool {
        let new_full_url = env.page_url().unwrap_or_default();
        if new_full_url == self.current_full_url {
            return false;
        }
        log::info!("Page URL changed to {new_full_url}, reloading comments");

        self.current_full_url = new_full_url;
        self.page_url = normalize_page_url(&self.current_full_url);

        self.disable_comment_mode();
        self.drawer_open = false;
        self.focused = None;
        self.pins.clear();

        self.load_comments(env);
        true
    }
}
