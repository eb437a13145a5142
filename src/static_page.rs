use crate::geometry::{Point, Rect, Size};
use crate::page::{NodeId, PageEnvironment};
use anyhow::Context;
use cssparser::{Parser, ParserInput, Token};
use serde::Deserialize;
use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// In-memory page: an element tree with fixed boxes, a scrollable viewport
/// and CSS selector lookup. The reference [`PageEnvironment`] for tests and
/// the inspector binary; a browser embedding replaces it with live DOM
/// calls.
///
/// Element boxes are absolute page coordinates. Later elements in document
/// order paint on top, which makes the deepest/last element win point
/// queries, like a browser's hit testing. Mutators ([`set_rect`](Self::set_rect),
/// [`detach`](Self::detach), [`set_content_size`](Self::set_content_size))
/// simulate reflows and DOM churn between captures.
#[derive(Debug)]
pub struct StaticPage {
    nodes: Vec<ElementData>,
    roots: Vec<usize>,
    viewport: Size,
    content: Size,
    scroll: Cell<Point>,
    url: Option<String>,
}

#[derive(Debug)]
struct ElementData {
    tag: String,
    attrs: HashMap<String, String>,
    rect: Rect,
    parent: Option<usize>,
    children: Vec<usize>,
    detached: bool,
}

impl StaticPage {
    pub fn new(viewport: Size, content: Size) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            viewport,
            content,
            scroll: Cell::new(Point::default()),
            url: None,
        }
    }

    /// Load a page snapshot from a JSON file (see [`Self::from_json_str`]).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read page snapshot {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Build a page from snapshot JSON:
    ///
    /// ```json
    /// {
    ///   "url": "https://example.test/page",
    ///   "viewport": [1280, 800],
    ///   "content": [1280, 2400],
    ///   "elements": [
    ///     { "tag": "body", "rect": [0, 0, 1280, 2400], "children": [
    ///       { "tag": "div", "attrs": { "id": "card" }, "rect": [100, 550, 200, 100] }
    ///     ] }
    ///   ]
    /// }
    /// ```
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let snapshot: PageSnapshot =
            serde_json::from_str(json).context("Failed to parse page snapshot")?;

        let mut page = Self::new(
            Size::new(snapshot.viewport[0], snapshot.viewport[1]),
            Size::new(snapshot.content[0], snapshot.content[1]),
        );
        page.url = snapshot.url;
        for element in snapshot.elements {
            page.add_snapshot_element(None, element);
        }
        Ok(page)
    }

    fn add_snapshot_element(&mut self, parent: Option<NodeId>, element: ElementSnapshot) {
        let rect = Rect::new(
            element.rect[0],
            element.rect[1],
            element.rect[2],
            element.rect[3],
        );
        let node = self.add_element(parent, &element.tag, rect);
        for (name, value) in element.attrs {
            self.set_attribute(node, &name, &value);
        }
        for child in element.children {
            self.add_snapshot_element(Some(node), child);
        }
    }

    /// Append an element, as the last child of `parent` or as a root.
    pub fn add_element(&mut self, parent: Option<NodeId>, tag: &str, rect: Rect) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: HashMap::new(),
            rect,
            parent: parent.map(NodeId::index),
            children: Vec::new(),
            detached: false,
        });
        match parent {
            Some(p) => self.nodes[p.index()].children.push(index),
            None => self.roots.push(index),
        }
        NodeId::new(index)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(node.index()) {
            data.attrs.insert(name.to_string(), value.to_string());
        }
    }

    /// Move or resize an element, simulating a reflow.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(data) = self.nodes.get_mut(node.index()) {
            data.rect = rect;
        }
    }

    /// Remove an element and its subtree from the document. Handles into
    /// the subtree go stale: every accessor answers `None` for them.
    pub fn detach(&mut self, node: NodeId) {
        let index = node.index();
        if index >= self.nodes.len() || self.nodes[index].detached {
            return;
        }
        match self.nodes[index].parent {
            Some(parent) => self.nodes[parent].children.retain(|&c| c != index),
            None => self.roots.retain(|&r| r != index),
        }
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            self.nodes[i].detached = true;
            stack.extend(self.nodes[i].children.iter().copied());
        }
    }

    pub fn set_scroll(&self, scroll: Point) {
        self.scroll.set(scroll);
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn set_content_size(&mut self, content: Size) {
        self.content = content;
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = Some(url.to_string());
    }

    fn node(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id.index()).filter(|n| !n.detached)
    }

    /// Preorder over the attached tree; the selector contract's "document
    /// order".
    fn document_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            for &child in self.nodes[index].children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    fn matches_step(&self, index: usize, step: &PathStep) -> bool {
        let data = &self.nodes[index];
        if data.tag != step.tag {
            return false;
        }
        let Some(nth) = step.nth_of_type else {
            return true;
        };
        let siblings: &[usize] = match data.parent {
            Some(parent) => &self.nodes[parent].children,
            None => &self.roots,
        };
        let position = siblings
            .iter()
            .filter(|&&s| self.nodes[s].tag == data.tag)
            .position(|&s| s == index);
        position.map(|p| p + 1) == Some(nth)
    }

    fn matches_selector(&self, index: usize, selector: &CompiledSelector) -> bool {
        match selector {
            CompiledSelector::Id(id) => self.nodes[index].attrs.get("id") == Some(id),
            CompiledSelector::Attr { name, value } => {
                self.nodes[index].attrs.get(name) == Some(value)
            }
            CompiledSelector::Path(steps) => {
                // Child combinators, matched right to left.
                let mut current = Some(index);
                for step in steps.iter().rev() {
                    let Some(node) = current else {
                        return false;
                    };
                    if !self.matches_step(node, step) {
                        return false;
                    }
                    current = self.nodes[node].parent;
                }
                true
            }
        }
    }
}

impl PageEnvironment for StaticPage {
    fn viewport_size(&self) -> Option<Size> {
        Some(self.viewport)
    }

    fn scroll_offset(&self) -> Option<Point> {
        Some(self.scroll.get())
    }

    fn content_size(&self) -> Option<Size> {
        Some(self.content)
    }

    fn element_at(&self, client: Point) -> Option<NodeId> {
        let scroll = self.scroll.get();
        let page_point = Point::new(client.x + scroll.x, client.y + scroll.y);
        let mut hit = None;
        for index in self.document_order() {
            if self.nodes[index].rect.contains(page_point) {
                hit = Some(NodeId::new(index));
            }
        }
        hit
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let compiled = parse_selector(selector)?;
        self.document_order()
            .into_iter()
            .find(|&index| self.matches_selector(index, &compiled))
            .map(NodeId::new)
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        let scroll = self.scroll.get();
        self.node(node)
            .map(|data| data.rect.translated(-scroll.x, -scroll.y))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.node(node).map(|data| data.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.node(node).and_then(|data| data.attrs.get(name).cloned())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|data| data.parent).map(NodeId::new)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|data| data.children.iter().copied().map(NodeId::new).collect())
            .unwrap_or_default()
    }

    fn scroll_to(&self, target: Point) {
        // Clamp like a browser: the page cannot scroll past its content.
        let max_x = (self.content.width - self.viewport.width).max(0.0);
        let max_y = (self.content.height - self.viewport.height).max(0.0);
        self.scroll.set(Point::new(
            target.x.clamp(0.0, max_x),
            target.y.clamp(0.0, max_y),
        ));
    }

    fn page_url(&self) -> Option<String> {
        self.url.clone()
    }
}

#[derive(Debug, Deserialize)]
struct PageSnapshot {
    #[serde(default)]
    url: Option<String>,
    viewport: [f64; 2],
    content: [f64; 2],
    #[serde(default)]
    elements: Vec<ElementSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ElementSnapshot {
    tag: String,
    #[serde(default)]
    attrs: HashMap<String, String>,
    rect: [f64; 4],
    #[serde(default)]
    children: Vec<ElementSnapshot>,
}

/// The selector subset anchors generate: `#id`, `[attr="value"]`, and tag
/// paths with child combinators and `:nth-of-type()`.
#[derive(Debug, Clone, PartialEq)]
enum CompiledSelector {
    Id(String),
    Attr { name: String, value: String },
    Path(Vec<PathStep>),
}

#[derive(Debug, Clone, PartialEq)]
struct PathStep {
    tag: String,
    nth_of_type: Option<usize>,
}

fn parse_selector(selector: &str) -> Option<CompiledSelector> {
    let mut input = ParserInput::new(selector);
    let mut parser = Parser::new(&mut input);

    let first = parser.next().ok()?.clone();
    match first {
        Token::IDHash(id) => {
            let id = id.to_string();
            parser.expect_exhausted().ok()?;
            Some(CompiledSelector::Id(id))
        }
        Token::SquareBracketBlock => {
            let attr: Result<(String, String), cssparser::ParseError<'_, ()>> = parser
                .parse_nested_block(|inner| {
                    let name = inner.expect_ident()?.to_string();
                    inner.expect_delim('=')?;
                    let value = inner.expect_string()?.to_string();
                    Ok((name, value))
                });
            let (name, value) = attr.ok()?;
            parser.expect_exhausted().ok()?;
            Some(CompiledSelector::Attr { name, value })
        }
        Token::Ident(tag) => {
            let mut steps = vec![PathStep {
                tag: tag.to_string().to_ascii_lowercase(),
                nth_of_type: None,
            }];
            parse_path_rest(&mut parser, &mut steps)?;
            Some(CompiledSelector::Path(steps))
        }
        _ => None,
    }
}

fn parse_path_rest(parser: &mut Parser, steps: &mut Vec<PathStep>) -> Option<()> {
    let mut expect_tag = false;
    loop {
        let token = match parser.next() {
            Ok(token) => token.clone(),
            // End of the selector.
            Err(_) => break,
        };
        match token {
            Token::Delim('>') => {
                if expect_tag {
                    return None;
                }
                expect_tag = true;
            }
            Token::Ident(tag) => {
                if !expect_tag {
                    return None;
                }
                steps.push(PathStep {
                    tag: tag.to_string().to_ascii_lowercase(),
                    nth_of_type: None,
                });
                expect_tag = false;
            }
            Token::Colon => {
                if expect_tag {
                    return None;
                }
                let function = parser.next().ok()?.clone();
                let Token::Function(name) = function else {
                    return None;
                };
                if !name.eq_ignore_ascii_case("nth-of-type") {
                    return None;
                }
                let nth: Result<i32, cssparser::ParseError<'_, ()>> =
                    parser.parse_nested_block(|inner| Ok(inner.expect_integer()?));
                let nth = nth.ok()?;
                if nth < 1 {
                    return None;
                }
                steps.last_mut()?.nth_of_type = Some(nth as usize);
            }
            _ => return None,
        }
    }
    if expect_tag {
        return None;
    }
    Some(())
}
