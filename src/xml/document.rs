use std::borrow::Cow;
use std::str;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;

use crate::xml::{Error, Result};

/// Handle to a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        /// Qualified name as written in the source, e.g. `des:solicitud`.
        name: String,
        /// Attributes in document order, including `xmlns`/`xmlns:*`
        /// declarations. Names are unique.
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A mutable ordered XML tree backed by an arena.
///
/// Whitespace-only text is dropped at parse time so that structural edits
/// and canonical serialization are independent of source indentation.
/// Detached nodes (e.g. children replaced by [`Document::set_text`]) stay
/// in the arena; nodes are never reclaimed during a document's lifetime.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

/// Local part of a qualified name (`des:solicitud` -> `solicitud`).
pub fn local_name(qname: &str) -> &str {
    match qname.split_once(':') {
        Some((_, local)) => local,
        None => qname,
    }
}

impl Document {
    /// Parse a document from a string. Comments and processing
    /// instructions are dropped; CDATA becomes regular text.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        reader.config_mut().expand_empty_elements = true;

        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = str::from_utf8(e.name().as_ref())?.to_string();
                    let mut attributes = Vec::new();
                    for attr in e.attributes().with_checks(true) {
                        let attr = attr?;
                        let key = str::from_utf8(attr.key.as_ref())?.to_string();
                        let value = attr.unescape_value()?.into_owned();
                        attributes.push((key, value));
                    }
                    let parent = stack.last().copied();
                    if parent.is_none() && root.is_some() {
                        return Err(Error::Parse("multiple root elements".into()));
                    }
                    let id = NodeId(nodes.len());
                    nodes.push(Node {
                        parent,
                        children: Vec::new(),
                        kind: NodeKind::Element { name, attributes },
                    });
                    if let Some(p) = parent {
                        nodes[p.0].children.push(id);
                    } else {
                        root = Some(id);
                    }
                    stack.push(id);
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Text(e)) => {
                    let raw = str::from_utf8(&e)?;
                    let normalized = normalize_line_endings(raw);
                    let text = unescape(&normalized).map_err(|e| Error::Parse(e.to_string()))?;
                    append_text(&mut nodes, &stack, &text)?;
                }
                Ok(Event::CData(e)) => {
                    let raw = e.into_inner();
                    let text = str::from_utf8(&raw)?;
                    let normalized = normalize_line_endings(text);
                    append_text(&mut nodes, &stack, &normalized)?;
                }
                Ok(Event::GeneralRef(e)) => {
                    let name = str::from_utf8(&e)?;
                    let resolved = resolve_reference(name)
                        .ok_or_else(|| Error::Parse(format!("unsupported reference '&{name};'")))?;
                    append_text(&mut nodes, &stack, &resolved.to_string())?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::Parse(e.to_string())),
            }
        }

        let root = root.ok_or_else(|| Error::Parse("no root element".into()))?;
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    /// Qualified name of an element node, `None` for text nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    /// Attributes of an element in document order (empty for text nodes).
    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes,
            NodeKind::Text(_) => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value for the same name.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Text content: the node's own text, or the first text child of an
    /// element.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element { .. } => self.children(id).iter().find_map(|&c| {
                match &self.nodes[c.0].kind {
                    NodeKind::Text(t) => Some(t.as_str()),
                    NodeKind::Element { .. } => None,
                }
            }),
        }
    }

    /// Replace an element's children with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id.0].children.clear();
        let child = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(id),
            children: Vec::new(),
            kind: NodeKind::Text(text.to_string()),
        });
        self.nodes[id.0].children.push(child);
    }

    /// Resolve a `/`-separated path of local names, starting below `from`.
    /// Each segment matches the first child element with that local name.
    pub fn find(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let mut current = from;
        for segment in path.split('/') {
            current = self
                .child_elements(current)
                .find(|&c| self.name(c).map(local_name) == Some(segment))?;
        }
        Some(current)
    }

    /// Deep-copy a subtree from another document and append it as the
    /// last child of `parent`. Returns the id of the copied root.
    pub fn adopt(&mut self, parent: NodeId, source: &Document, node: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind: source.nodes[node.0].kind.clone(),
        });
        self.nodes[parent.0].children.push(id);
        for child in source.children(node).to_vec() {
            self.adopt(id, source, child);
        }
        id
    }

    /// Plain serialization of the subtree rooted at `id`, mainly for
    /// diagnostics and tests. Use [`crate::xml::c14n`] for wire output.
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::Element { name, attributes } => {
                out.push('<');
                out.push_str(name);
                for (k, v) in attributes {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(v));
                    out.push('"');
                }
                if self.children(id).is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in self.children(id) {
                        self.write_node(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
    }
}

fn append_text(nodes: &mut Vec<Node>, stack: &[NodeId], text: &str) -> Result<()> {
    let Some(&parent) = stack.last() else {
        // Whitespace between the prolog and the root is insignificant
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(Error::Parse("text content outside the root element".into()));
    };
    // Merge with a preceding text sibling so references and CDATA do not
    // fragment the content
    if let Some(&last) = nodes[parent.0].children.last() {
        if let NodeKind::Text(existing) = &mut nodes[last.0].kind {
            existing.push_str(text);
            return Ok(());
        }
    }
    if text.trim().is_empty() {
        return Ok(());
    }
    let id = NodeId(nodes.len());
    nodes.push(Node {
        parent: Some(parent),
        children: Vec::new(),
        kind: NodeKind::Text(text.to_string()),
    });
    nodes[parent.0].children.push(id);
    Ok(())
}

/// Resolve a general or character reference name (the part between `&`
/// and `;`).
fn resolve_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

/// Normalize CRLF and lone CR to LF, per XML line-ending rules.
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            result.push('\n');
        } else {
            result.push(ch);
        }
    }
    Cow::Owned(result)
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
