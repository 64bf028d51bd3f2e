use std::collections::{BTreeMap, BTreeSet};

use crate::xml::{Document, Error, NodeId, Result};

/// Perform Exclusive XML Canonicalization (omitting comments) of the
/// subtree rooted at `node`.
///
/// Namespace declarations are rendered only where visibly utilized and not
/// already rendered by an ancestor in the output; declarations inherited
/// from ancestors of `node` are taken into account so a subtree can be
/// canonicalized out of the middle of a document. Attributes are ordered
/// by (namespace URI, local name), namespace declarations by prefix. The
/// input tree is not mutated.
pub fn canonicalize(doc: &Document, node: NodeId) -> Result<String> {
    if !doc.is_element(node) {
        return Err(Error::NotAnElement);
    }

    // In-scope declarations from ancestors, nearest declaration winning
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();
    let mut chain = Vec::new();
    let mut current = doc.parent(node);
    while let Some(id) = current {
        chain.push(id);
        current = doc.parent(id);
    }
    for id in chain.iter().rev() {
        for (key, value) in doc.attributes(*id) {
            apply_declaration(&mut inherited, key, value);
        }
    }

    let mut out = String::new();
    render_element(doc, node, &inherited, &BTreeMap::new(), &mut out)?;
    Ok(out)
}

/// Record an `xmlns`/`xmlns:*` attribute in a prefix map. An empty URI
/// undeclares the prefix.
fn apply_declaration(declared: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let prefix = if key == "xmlns" {
        Some("")
    } else {
        key.strip_prefix("xmlns:")
    };
    if let Some(prefix) = prefix {
        if value.is_empty() {
            declared.remove(prefix);
        } else {
            declared.insert(prefix.to_string(), value.to_string());
        }
    }
}

fn prefix_of(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

fn render_element(
    doc: &Document,
    id: NodeId,
    declared: &BTreeMap<String, String>,
    rendered: &BTreeMap<String, String>,
    out: &mut String,
) -> Result<()> {
    let name = doc.name(id).ok_or(Error::NotAnElement)?;

    // Separate namespace declarations from regular attributes
    let mut current_declared = declared.clone();
    let mut regular_attrs = Vec::new();
    for (key, value) in doc.attributes(id) {
        if key == "xmlns" || key.starts_with("xmlns:") {
            apply_declaration(&mut current_declared, key, value);
        } else {
            regular_attrs.push((key.as_str(), value.as_str()));
        }
    }

    // Determine visibly-utilized prefixes
    let mut visibly_utilized = BTreeSet::new();
    visibly_utilized.insert(prefix_of(name).unwrap_or(""));
    for (key, _) in &regular_attrs {
        if let Some(prefix) = prefix_of(key) {
            // xml: is never rendered as it's implicitly bound
            if prefix != "xml" {
                visibly_utilized.insert(prefix);
            }
        }
    }

    // Namespace declarations to render, in prefix order (the set is sorted)
    let mut render_ns = Vec::new();
    for &prefix in &visibly_utilized {
        if prefix == "xml" {
            continue;
        }
        match current_declared.get(prefix) {
            Some(uri) => {
                let already_rendered = rendered.get(prefix) == Some(uri);
                if !already_rendered {
                    render_ns.push((prefix, uri.clone()));
                }
            }
            None if prefix.is_empty() => {
                // No default namespace in scope; nothing to render
            }
            None => return Err(Error::UnboundPrefix(prefix.to_string())),
        }
    }

    out.push('<');
    out.push_str(name);
    for (prefix, uri) in &render_ns {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_attr_value(uri));
        out.push('"');
    }

    // Sort regular attributes by (namespace URI, local name)
    let mut attr_info = Vec::new();
    for (key, value) in &regular_attrs {
        let (ns_uri, local) = match key.split_once(':') {
            Some(("xml", local)) => ("http://www.w3.org/XML/1998/namespace".to_string(), local),
            Some((prefix, local)) => {
                let uri = current_declared
                    .get(prefix)
                    .ok_or_else(|| Error::UnboundPrefix(prefix.to_string()))?;
                (uri.clone(), local)
            }
            None => (String::new(), *key),
        };
        attr_info.push((ns_uri, local, *key, *value));
    }
    attr_info.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    for (_, _, key, value) in &attr_info {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr_value(value));
        out.push('"');
    }
    out.push('>');

    let mut child_rendered = rendered.clone();
    for (prefix, uri) in render_ns {
        child_rendered.insert(prefix.to_string(), uri);
    }

    for &child in doc.children(id) {
        if doc.is_element(child) {
            render_element(doc, child, &current_declared, &child_rendered, out)?;
        } else if let Some(text) = doc.text(child) {
            out.push_str(&escape_text_value(text));
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
    Ok(())
}

/// Escape an attribute value per C14N rules.
fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / 4);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape a text node per C14N rules.
fn escape_text_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / 4);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        canonicalize(&doc, doc.root()).unwrap()
    }

    #[test]
    fn test_basic_canonicalization() {
        let xml = r#"<root><child attr="value">text</child></root>"#;
        assert_eq!(c14n(xml), r#"<root><child attr="value">text</child></root>"#);
    }

    #[test]
    fn test_empty_elements_are_expanded() {
        assert_eq!(c14n("<root><child/></root>"), "<root><child></child></root>");
    }

    #[test]
    fn test_attribute_order_is_normalized() {
        let a = c14n(r#"<root b="2" a="1" c="3"/>"#);
        let b = c14n(r#"<root c="3" a="1" b="2"/>"#);
        assert_eq!(a, b);
        assert_eq!(a, r#"<root a="1" b="2" c="3"></root>"#);
    }

    #[test]
    fn test_attributes_sorted_by_namespace_then_local_name() {
        let xml = r#"<root xmlns:z="http://a.com" xmlns:a="http://z.com" a:one="1" z:two="2" plain="0"/>"#;
        // Unqualified first, then by namespace URI: z:two (http://a.com)
        // before a:one (http://z.com)
        let result = c14n(xml);
        assert_eq!(
            result,
            r#"<root xmlns:a="http://z.com" xmlns:z="http://a.com" plain="0" z:two="2" a:one="1"></root>"#
        );
    }

    #[test]
    fn test_namespace_not_duplicated_on_children() {
        let xml = r#"<root xmlns="http://example.com"><child>text</child></root>"#;
        let result = c14n(xml);
        assert_eq!(result.matches(r#"xmlns="http://example.com""#).count(), 1);
    }

    #[test]
    fn test_unused_namespace_is_dropped() {
        let xml = r#"<root xmlns:a="http://a.com"><child>text</child></root>"#;
        let result = c14n(xml);
        assert!(!result.contains("xmlns:a"));
    }

    #[test]
    fn test_prefix_utilized_by_element() {
        let xml = r#"<root xmlns:a="http://a.com"><a:child>text</a:child></root>"#;
        let result = c14n(xml);
        assert!(result.contains(r#"<a:child xmlns:a="http://a.com">"#));
    }

    #[test]
    fn test_prefix_utilized_by_attribute() {
        let xml = r#"<root xmlns:a="http://a.com"><child a:attr="value">text</child></root>"#;
        let result = c14n(xml);
        assert!(result.contains(r#"<child xmlns:a="http://a.com" a:attr="value">"#));
    }

    #[test]
    fn test_inherited_namespaces_rendered_on_subtree_apex() {
        let xml = r#"<s:root xmlns:s="http://s.com" xmlns:u="http://u.com"><s:inner><s:leaf u:id="1"/></s:inner></s:root>"#;
        let doc = Document::parse(xml).unwrap();
        let inner = doc.find(doc.root(), "inner").unwrap();
        let result = canonicalize(&doc, inner).unwrap();
        assert_eq!(
            result,
            r#"<s:inner xmlns:s="http://s.com"><s:leaf xmlns:u="http://u.com" u:id="1"></s:leaf></s:inner>"#
        );
    }

    #[test]
    fn test_default_namespace_inherited_by_apex() {
        let xml = r#"<root xmlns="http://d.com"><inner><leaf/></inner></root>"#;
        let doc = Document::parse(xml).unwrap();
        let inner = doc.find(doc.root(), "inner").unwrap();
        let result = canonicalize(&doc, inner).unwrap();
        assert_eq!(
            result,
            r#"<inner xmlns="http://d.com"><leaf></leaf></inner>"#
        );
    }

    #[test]
    fn test_unbound_prefix_is_an_error() {
        let doc = Document::parse("<a:root>text</a:root>").unwrap();
        let result = canonicalize(&doc, doc.root());
        assert!(matches!(result, Err(Error::UnboundPrefix(p)) if p == "a"));
    }

    #[test]
    fn test_attribute_escaping() {
        let xml = "<root attr=\"&lt;&quot;&#x9;&#xA;&#xD;\">text</root>";
        let result = c14n(xml);
        assert!(result.contains("&lt;&quot;&#x9;&#xA;&#xD;"));
    }

    #[test]
    fn test_text_escaping() {
        let xml = "<root>a &amp; b &lt; c &gt; d</root>";
        assert_eq!(c14n(xml), "<root>a &amp; b &lt; c &gt; d</root>");
    }

    #[test]
    fn test_whitespace_variants_canonicalize_identically() {
        let compact = r#"<root><child a="1">text</child></root>"#;
        let spaced = "<root>\n  <child a=\"1\">text</child>\n</root>";
        assert_eq!(c14n(compact), c14n(spaced));
    }

    #[test]
    fn test_does_not_mutate_input() {
        let doc = Document::parse(r#"<root b="2" a="1"><x/></root>"#).unwrap();
        let before = doc.to_xml(doc.root());
        let _ = canonicalize(&doc, doc.root()).unwrap();
        assert_eq!(doc.to_xml(doc.root()), before);
    }
}
