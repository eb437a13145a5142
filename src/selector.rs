use crate::page::{NodeId, PageEnvironment};
use cssparser::{serialize_identifier, serialize_string};

/// Data attributes stable enough to anchor on, in lookup order.
pub const SAFE_ATTRS: [&str; 3] = ["data-testid", "data-id", "data-name"];

/// Structural paths walk up at most this many levels.
const MAX_PATH_DEPTH: usize = 4;

/// Derive a CSS selector for an element, preferring stable handles.
///
/// Priority: `id`, then the first populated [`SAFE_ATTRS`] attribute, then a
/// short structural path. Returns `None` when the environment no longer
/// knows the element (stale handle), in which case the anchor degrades to
/// its coordinate fallbacks.
pub fn generate_selector(env: &dyn PageEnvironment, node: NodeId) -> Option<String> {
    if let Some(id) = env.attribute(node, "id") {
        if !id.is_empty() {
            let mut out = String::from("#");
            serialize_identifier(&id, &mut out).ok()?;
            return Some(out);
        }
    }

    for attr in SAFE_ATTRS {
        if let Some(value) = env.attribute(node, attr) {
            if !value.is_empty() {
                let mut out = format!("[{attr}=");
                serialize_string(&value, &mut out).ok()?;
                out.push(']');
                return Some(out);
            }
        }
    }

    structural_path(env, node)
}

/// Innermost-last tag path like `body > section > div:nth-of-type(2)`.
/// `nth-of-type` is emitted only when the element actually competes with a
/// same-tag sibling; indices are 1-based.
fn structural_path(env: &dyn PageEnvironment, node: NodeId) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(node);

    while let Some(el) = current {
        if parts.len() == MAX_PATH_DEPTH {
            break;
        }
        let Some(tag) = env.tag_name(el) else {
            break;
        };
        let tag = tag.to_ascii_lowercase();
        let parent = env.parent(el);

        let mut segment = tag.clone();
        if let Some(parent) = parent {
            let same_tag: Vec<NodeId> = env
                .children(parent)
                .into_iter()
                .filter(|&sibling| {
                    env.tag_name(sibling)
                        .is_some_and(|t| t.eq_ignore_ascii_case(&tag))
                })
                .collect();
            if same_tag.len() > 1 {
                if let Some(position) = same_tag.iter().position(|&sibling| sibling == el) {
                    segment = format!("{}:nth-of-type({})", tag, position + 1);
                }
            }
        }

        parts.push(segment);
        current = parent;
    }

    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join(" > "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Size};
    use crate::static_page::StaticPage;

    fn page() -> StaticPage {
        StaticPage::new(Size::new(1024.0, 768.0), Size::new(1024.0, 2000.0))
    }

    #[test]
    fn id_wins_over_everything() {
        let mut page = page();
        let body = page.add_element(None, "body", Rect::new(0.0, 0.0, 1024.0, 2000.0));
        let el = page.add_element(Some(body), "div", Rect::new(10.0, 10.0, 100.0, 50.0));
        page.set_attribute(el, "id", "hero");
        page.set_attribute(el, "data-testid", "ignored");

        assert_eq!(generate_selector(&page, el).as_deref(), Some("#hero"));
    }

    #[test]
    fn id_with_css_metacharacters_is_escaped() {
        let mut page = page();
        let el = page.add_element(None, "div", Rect::new(0.0, 0.0, 10.0, 10.0));
        page.set_attribute(el, "id", "a.b:c");

        assert_eq!(generate_selector(&page, el).as_deref(), Some("#a\\.b\\:c"));
    }

    #[test]
    fn data_attributes_in_declared_order() {
        let mut page = page();
        let el = page.add_element(None, "span", Rect::new(0.0, 0.0, 10.0, 10.0));
        page.set_attribute(el, "data-name", "later");
        page.set_attribute(el, "data-id", "row-7");

        assert_eq!(
            generate_selector(&page, el).as_deref(),
            Some("[data-id=\"row-7\"]")
        );
    }

    #[test]
    fn attribute_values_with_quotes_are_escaped() {
        let mut page = page();
        let el = page.add_element(None, "span", Rect::new(0.0, 0.0, 10.0, 10.0));
        page.set_attribute(el, "data-testid", "say \"hi\"");

        assert_eq!(
            generate_selector(&page, el).as_deref(),
            Some("[data-testid=\"say \\\"hi\\\"\"]")
        );
    }

    #[test]
    fn empty_id_falls_through_to_path() {
        let mut page = page();
        let body = page.add_element(None, "body", Rect::new(0.0, 0.0, 1024.0, 2000.0));
        let el = page.add_element(Some(body), "p", Rect::new(0.0, 0.0, 10.0, 10.0));
        page.set_attribute(el, "id", "");

        assert_eq!(generate_selector(&page, el).as_deref(), Some("body > p"));
    }

    #[test]
    fn nth_of_type_only_under_sibling_competition() {
        let mut page = page();
        let body = page.add_element(None, "body", Rect::new(0.0, 0.0, 1024.0, 2000.0));
        let section = page.add_element(Some(body), "section", Rect::new(0.0, 0.0, 1024.0, 600.0));
        let _first = page.add_element(Some(section), "div", Rect::new(0.0, 0.0, 100.0, 100.0));
        let second = page.add_element(Some(section), "div", Rect::new(0.0, 100.0, 100.0, 100.0));
        // A lone same-level element of a different tag never gets an index.
        let aside = page.add_element(Some(section), "aside", Rect::new(0.0, 200.0, 100.0, 100.0));

        assert_eq!(
            generate_selector(&page, second).as_deref(),
            Some("body > section > div:nth-of-type(2)")
        );
        assert_eq!(
            generate_selector(&page, aside).as_deref(),
            Some("body > section > aside")
        );
    }

    #[test]
    fn path_depth_is_capped() {
        let mut page = page();
        let mut parent = page.add_element(None, "body", Rect::new(0.0, 0.0, 1024.0, 2000.0));
        for tag in ["main", "article", "section", "div", "p"] {
            parent = page.add_element(Some(parent), tag, Rect::new(0.0, 0.0, 500.0, 500.0));
        }

        let selector = generate_selector(&page, parent);
        assert_eq!(selector.as_deref(), Some("article > section > div > p"));
    }

    #[test]
    fn detached_element_yields_none() {
        let mut page = page();
        let el = page.add_element(None, "div", Rect::new(0.0, 0.0, 10.0, 10.0));
        page.detach(el);

        assert_eq!(generate_selector(&page, el), None);
    }
}
