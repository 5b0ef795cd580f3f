// src/extractors/xml.rs
use roxmltree::{Document, Node};

/// Element lookups bound to the namespace of the document root.
///
/// EDGAR XML comes with a default namespace, with a prefixed one, or with none
/// at all. The root's namespace is captured once and every lookup compares
/// against it, so callers only ever name local element names.
#[derive(Debug, Clone, Copy)]
pub struct NsScope<'a> {
    ns: Option<&'a str>,
}

impl<'a> NsScope<'a> {
    pub fn of_root<'input>(doc: &'a Document<'input>) -> Self {
        Self {
            ns: doc.root_element().tag_name().namespace(),
        }
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.ns
    }

    pub fn is(&self, node: Node, local: &str) -> bool {
        node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == self.ns
    }

    pub fn child<'d, 'input>(&self, node: Node<'d, 'input>, local: &str) -> Option<Node<'d, 'input>> {
        node.children().find(|n| self.is(*n, local))
    }

    pub fn children<'d, 'input>(
        &self,
        node: Node<'d, 'input>,
        local: &'a str,
    ) -> impl Iterator<Item = Node<'d, 'input>> + 'a
    where
        'd: 'a,
    {
        let scope = *self;
        node.children().filter(move |n| scope.is(*n, local))
    }

    pub fn descendants<'d, 'input>(
        &self,
        node: Node<'d, 'input>,
        local: &'a str,
    ) -> impl Iterator<Item = Node<'d, 'input>> + 'a
    where
        'd: 'a,
    {
        let scope = *self;
        node.descendants().filter(move |n| scope.is(*n, local))
    }

    /// Follows a chain of child element names.
    pub fn path<'d, 'input>(&self, node: Node<'d, 'input>, path: &[&str]) -> Option<Node<'d, 'input>> {
        path.iter().try_fold(node, |current, local| self.child(current, local))
    }

    /// Trimmed text at `path`, or `None` when absent or blank.
    pub fn text(&self, node: Node, path: &[&str]) -> Option<String> {
        let target = self.path(node, path)?;
        let text: String = target
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Parses an integer-ish field: grouping commas are dropped and decimals are
/// rounded ("1,234.0" -> 1234).
pub fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64))
}

pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_follows_default_prefixed_and_missing_namespaces() {
        let default_ns = r#"<root xmlns="urn:x"><a><b> one </b></a></root>"#;
        let prefixed = r#"<x:root xmlns:x="urn:x"><x:a><x:b>one</x:b></x:a></x:root>"#;
        let bare = r#"<root><a><b>one</b></a></root>"#;

        for xml in [default_ns, prefixed, bare] {
            let doc = Document::parse(xml).unwrap();
            let scope = NsScope::of_root(&doc);
            assert_eq!(scope.text(doc.root_element(), &["a", "b"]).as_deref(), Some("one"), "{xml}");
            assert!(scope.text(doc.root_element(), &["a", "missing"]).is_none());
        }
    }

    #[test]
    fn scope_ignores_foreign_namespace_elements() {
        let xml = r#"<root xmlns="urn:x" xmlns:y="urn:y"><y:a>foreign</y:a><a>own</a></root>"#;
        let doc = Document::parse(xml).unwrap();
        let scope = NsScope::of_root(&doc);
        assert_eq!(scope.namespace(), Some("urn:x"));
        assert_eq!(scope.text(doc.root_element(), &["a"]).as_deref(), Some("own"));
    }

    #[test]
    fn integers_accept_grouping_and_decimals() {
        assert_eq!(parse_integer("1,234"), Some(1234));
        assert_eq!(parse_integer("1234.6"), Some(1235));
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_decimal("12.50"), Some(12.5));
        assert_eq!(parse_decimal("NaN"), None);
    }
}
