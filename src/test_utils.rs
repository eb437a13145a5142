pub mod test_helpers {
    use crate::anchor::ClickEvent;
    use crate::comments::{Comment, CommentService, LocalCommentStore, StoreConfig};
    use crate::geometry::{Point, Rect, Size};
    use crate::overlay::{CommentOverlay, OverlayConfig};
    use crate::page::PageEnvironment;
    use crate::static_page::StaticPage;

    /// A canned article page shared by the integration tests.
    ///
    /// Layout (page coordinates, 800x600 viewport over 800x3000 content):
    ///
    /// ```text
    /// body
    ///   header#site-header (0,0 800x80), contains button[data-testid=share]
    ///   main (0,80 600x2720)
    ///     article (0,100 600x2600)
    ///       section (0,100 600x800), contains div#card (100,550 200x100)
    ///       section (0,900 600x800), three anonymous divs
    ///   footer (0,2900 800x100)
    /// ```
    pub fn sample_article_page() -> StaticPage {
        let mut page = StaticPage::new(Size::new(800.0, 600.0), Size::new(800.0, 3000.0));
        page.set_url("https://example.test/articles/42");

        let body = page.add_element(None, "body", Rect::new(0.0, 0.0, 800.0, 3000.0));

        let header = page.add_element(Some(body), "header", Rect::new(0.0, 0.0, 800.0, 80.0));
        page.set_attribute(header, "id", "site-header");
        let share = page.add_element(Some(header), "button", Rect::new(700.0, 20.0, 80.0, 40.0));
        page.set_attribute(share, "data-testid", "share");

        let main = page.add_element(Some(body), "main", Rect::new(0.0, 80.0, 600.0, 2720.0));
        let article = page.add_element(Some(main), "article", Rect::new(0.0, 100.0, 600.0, 2600.0));

        let intro = page.add_element(Some(article), "section", Rect::new(0.0, 100.0, 600.0, 800.0));
        let card = page.add_element(Some(intro), "div", Rect::new(100.0, 550.0, 200.0, 100.0));
        page.set_attribute(card, "id", "card");

        let gallery = page.add_element(Some(article), "section", Rect::new(0.0, 900.0, 600.0, 800.0));
        page.add_element(Some(gallery), "div", Rect::new(0.0, 900.0, 600.0, 250.0));
        page.add_element(Some(gallery), "div", Rect::new(0.0, 1150.0, 600.0, 250.0));
        page.add_element(Some(gallery), "div", Rect::new(0.0, 1400.0, 600.0, 250.0));

        page.add_element(Some(body), "footer", Rect::new(0.0, 2900.0, 800.0, 100.0));
        page
    }

    /// Click at client (viewport-relative) coordinates.
    pub fn click(env: &dyn PageEnvironment, x: f64, y: f64) -> ClickEvent {
        ClickEvent::at_client(env, Point::new(x, y))
    }

    /// Overlay backed by a local store that never touches disk.
    pub fn ephemeral_overlay() -> CommentOverlay {
        CommentOverlay::new(
            OverlayConfig::default(),
            Box::new(CommentService::new(
                StoreConfig::default(),
                LocalCommentStore::ephemeral(),
            )),
        )
    }

    /// Overlay persisting to `dir`, for tests that reopen the store.
    pub fn overlay_with_dir(dir: impl Into<std::path::PathBuf>) -> CommentOverlay {
        CommentOverlay::new(
            OverlayConfig::default(),
            Box::new(CommentService::new(
                StoreConfig::default(),
                LocalCommentStore::with_dir(dir),
            )),
        )
    }

    /// Drive the whole placement flow: enable comment mode, click, submit.
    pub fn place_comment(
        overlay: &mut CommentOverlay,
        page: &StaticPage,
        x: f64,
        y: f64,
        text: &str,
    ) -> Option<Comment> {
        overlay.enable_comment_mode();
        overlay.handle_click(page, click(page, x, y));
        overlay.submit_editor(text)
    }
}
