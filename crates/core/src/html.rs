//! Minimal HTML tree for scraping the what-if pages.
//!
//! The tree is an arena: nodes live in one vector and refer to their parent
//! and children by [`NodeId`]. Parent links are plain indices, so they never
//! own anything and the whole tree is released with the [`HtmlTree`] value.
//!
//! Parsing is driven by the html5ever tokenizer. Start tags open a child
//! under the cursor, end tags walk the cursor back up to the matching element
//! (unbalanced markup is tolerated rather than rejected), and text becomes a
//! leaf under the cursor.
//!
//! # Example
//!
//! ```rust
//! use xxkcd_core::HtmlTree;
//!
//! let tree = HtmlTree::parse(r#"<div class="x"><p id="q">hi</p></div>"#);
//! let p = tree.root().get_element_by_id("q").unwrap();
//! assert_eq!(p.tag(), Some("p"));
//! assert_eq!(p.text_content(), "hi");
//! assert_eq!(p.parent().unwrap().class(), "x");
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts, TokenizerResult};

/// Elements that never have content, whether or not the markup closes them.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Index of a node inside its [`HtmlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic document root.
    Root,
    /// An element with its lower-cased name and attributes in source order.
    Element { name: String, attrs: Vec<(String, String)> },
    /// Character data. Always a leaf.
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An immutable parsed document.
#[derive(Debug, Clone)]
pub struct HtmlTree {
    nodes: Vec<NodeData>,
}

impl HtmlTree {
    const ROOT: NodeId = NodeId(0);

    fn new() -> Self {
        Self::with_capacity(1)
    }

    fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(NodeData { kind: NodeKind::Root, parent: None, children: Vec::new() });
        Self { nodes }
    }

    /// Parses `input` with a throwaway [`TreeParser`].
    pub fn parse(input: impl AsRef<[u8]>) -> Self {
        TreeParser::new().parse(input)
    }

    /// The document root.
    pub fn root(&self) -> Node<'_> {
        Node { tree: self, id: Self::ROOT }
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        (id.0 < self.nodes.len()).then_some(Node { tree: self, id })
    }

    /// Get the total number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document has nothing but the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn push(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { kind, parent: Some(parent), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }
}

/// A borrowed view of one node.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a HtmlTree,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.tree.data(self.id).kind
    }

    /// Element name, or `None` for the root and text nodes.
    pub fn tag(&self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind(), NodeKind::Text(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind(), NodeKind::Element { .. })
    }

    /// The character data of a text node.
    pub fn text(&self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        let parent = self.tree.data(self.id).parent?;
        Some(Node { tree: self.tree, id: parent })
    }

    /// Follows parent links up to the document root.
    pub fn root(&self) -> Node<'a> {
        let mut node = *self;
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        tree.data(self.id).children.iter().map(move |&id| Node { tree, id })
    }

    /// Children that are not text.
    pub fn element_children(&self) -> Vec<Node<'a>> {
        self.children().filter(|child| !child.is_text()).collect()
    }

    /// First child that is not text.
    pub fn first_element_child(&self) -> Option<Node<'a>> {
        self.children().find(|child| !child.is_text())
    }

    /// Attributes in source order; empty for non-elements.
    pub fn attributes(&self) -> &'a [(String, String)] {
        match self.kind() {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Attributes as a map. A repeated name keeps its last value.
    pub fn attr_map(&self) -> HashMap<&'a str, &'a str> {
        self.attributes()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attributes()
            .iter()
            .rev()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&'a str> {
        self.attr("id")
    }

    /// The raw `class` attribute, or `""` when absent.
    pub fn class(&self) -> &'a str {
        self.attr("class").unwrap_or("")
    }

    /// First node in breadth-first order, starting with this one, that
    /// satisfies `predicate`. Text nodes are never offered.
    pub fn find<P>(&self, predicate: P) -> Option<Node<'a>>
    where
        P: FnMut(&Node<'a>) -> bool,
    {
        self.find_all(predicate).next()
    }

    /// Every match in breadth-first order. Each call starts a new traversal.
    pub fn find_all<P>(&self, predicate: P) -> FindAll<'a, P>
    where
        P: FnMut(&Node<'a>) -> bool,
    {
        FindAll { tree: self.tree, queue: VecDeque::from([self.id]), predicate }
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Node<'a>> {
        self.find(|node| node.id() == Some(id))
    }

    /// All text below this node, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            let data = self.tree.data(id);
            if let NodeKind::Text(text) = &data.kind {
                out.push_str(text);
            }
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Root => write!(f, "<root children={}>", self.tree.data(self.id).children.len()),
            NodeKind::Text(text) => write!(f, "<text {text:?}>"),
            NodeKind::Element { name, attrs } => {
                write!(f, "<{name} attrs={attrs:?} children={}>", self.tree.data(self.id).children.len())
            }
        }
    }
}

/// Lazy breadth-first search, see [`Node::find_all`].
pub struct FindAll<'a, P> {
    tree: &'a HtmlTree,
    queue: VecDeque<NodeId>,
    predicate: P,
}

impl<'a, P> Iterator for FindAll<'a, P>
where
    P: FnMut(&Node<'a>) -> bool,
{
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.queue.pop_front() {
            let node = Node { tree: self.tree, id };
            if node.is_text() {
                continue;
            }
            self.queue.extend(self.tree.data(id).children.iter().copied());
            if (self.predicate)(&node) {
                return Some(node);
            }
        }
        None
    }
}

/// Tree-building state for one parse.
struct Builder {
    tree: HtmlTree,
    cursor: NodeId,
}

impl Builder {
    fn new(capacity: usize) -> Self {
        Self { tree: HtmlTree::with_capacity(capacity), cursor: HtmlTree::ROOT }
    }

    fn start_tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        let name = tag.name.to_ascii_lowercase().to_string();
        let attrs = tag
            .attrs
            .iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();

        let is_void = tag.self_closing || VOID_ELEMENTS.contains(&name.as_str());
        let raw_kind = match name.as_str() {
            _ if is_void => None,
            "script" => Some(RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
            "title" | "textarea" => Some(RawKind::Rcdata),
            _ => None,
        };

        let id = self.tree.push(NodeKind::Element { name, attrs }, self.cursor);
        if !is_void {
            self.cursor = id;
        }

        match raw_kind {
            Some(kind) => TokenSinkResult::RawData(kind),
            None => TokenSinkResult::Continue,
        }
    }

    fn end_tag(&mut self, name: &str) {
        let mut current = Some(self.cursor);
        while let Some(id) = current {
            let data = self.tree.data(id);
            if let NodeKind::Element { name: open, .. } = &data.kind
                && open.eq_ignore_ascii_case(name)
            {
                self.cursor = data.parent.unwrap_or(HtmlTree::ROOT);
                return;
            }
            current = data.parent;
        }
    }

    fn text(&mut self, data: &str) {
        let last = self.tree.data(self.cursor).children.last().copied();
        if let Some(last) = last
            && let NodeKind::Text(existing) = &mut self.tree.nodes[last.0].kind
        {
            existing.push_str(data);
            return;
        }
        self.tree.push(NodeKind::Text(data.to_string()), self.cursor);
    }
}

struct Sink {
    builder: RefCell<Builder>,
}

impl TokenSink for Sink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let mut builder = self.builder.borrow_mut();
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return builder.start_tag(tag),
                TagKind::EndTag => builder.end_tag(&tag.name),
            },
            Token::CharacterTokens(text) => builder.text(&text),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

/// Reusable HTML-to-tree parser.
///
/// Parsing takes `&mut self`, so a parser is never driven from two places at
/// once; concurrent callers use one parser each.
#[derive(Debug, Default)]
pub struct TreeParser {
    last_len: usize,
}

impl TreeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one tree from `input`. Invalid UTF-8 is replaced.
    pub fn parse(&mut self, input: impl AsRef<[u8]>) -> HtmlTree {
        let text = String::from_utf8_lossy(input.as_ref());

        let sink = Sink { builder: RefCell::new(Builder::new(self.last_len)) };
        let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from_slice(&text));
        match tokenizer.feed(&queue) {
            TokenizerResult::Done => {}
            // The sink never hands back a script to run.
            TokenizerResult::Script(()) => {}
        }
        tokenizer.end();

        let tree = tokenizer.sink.builder.replace(Builder::new(0)).tree;
        self.last_len = tree.len();
        tree
    }
}

impl Default for HtmlTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags<'a>(nodes: impl IntoIterator<Item = Node<'a>>) -> Vec<&'a str> {
        nodes.into_iter().filter_map(|node| node.tag()).collect()
    }

    #[test]
    fn test_simple_tree() {
        let tree = HtmlTree::parse(r#"<div class="x"><p id="q">hi</p></div>"#);
        let root = tree.root();

        let children = root.element_children();
        assert_eq!(children.len(), 1);
        let div = children[0];
        assert_eq!(div.tag(), Some("div"));
        assert_eq!(div.class(), "x");

        let div_children: Vec<_> = div.children().collect();
        assert_eq!(div_children.len(), 1);
        let p = div_children[0];
        assert_eq!(p.tag(), Some("p"));
        assert_eq!(p.id(), Some("q"));

        let p_children: Vec<_> = p.children().collect();
        assert_eq!(p_children.len(), 1);
        assert!(p_children[0].is_text());
        assert_eq!(p_children[0].text(), Some("hi"));
    }

    #[test]
    fn test_unbalanced_end_tags() {
        let tree = HtmlTree::parse("<div><span><b>bold</div><p>after</p></i>");
        let root = tree.root();

        assert_eq!(tags(root.element_children()), vec!["div", "p"]);
        let p = root.find(|n| n.tag() == Some("p")).unwrap();
        assert_eq!(p.text_content(), "after");
    }

    #[test]
    fn test_void_elements_have_no_children() {
        let tree = HtmlTree::parse(r#"<a href="/1/"><img src="/a.png">caption</a>"#);
        let a = tree.root().first_element_child().unwrap();
        let img = a.first_element_child().unwrap();

        assert_eq!(img.tag(), Some("img"));
        assert_eq!(img.children().count(), 0);
        assert_eq!(a.text_content(), "caption");
    }

    #[test]
    fn test_script_is_raw_text() {
        let tree = HtmlTree::parse("<script>if (a < b) { x('<p>'); }</script><p>real</p>");
        let root = tree.root();

        assert_eq!(tags(root.element_children()), vec!["script", "p"]);
        assert_eq!(root.find_all(|n| n.tag() == Some("p")).count(), 1);
    }

    #[test]
    fn test_text_is_merged_and_unescaped() {
        let tree = HtmlTree::parse("<p>Fish &amp; chips &eacute;</p>");
        let p = tree.root().first_element_child().unwrap();

        assert_eq!(p.children().count(), 1);
        assert_eq!(p.text_content(), "Fish & chips é");
    }

    #[test]
    fn test_find_all_is_breadth_first_and_restartable() {
        let tree = HtmlTree::parse(
            r#"<div class="e"><div class="e" id="inner"></div></div><div class="e" id="second"></div>"#,
        );
        let root = tree.root();

        let ids: Vec<_> = root.find_all(|n| n.class() == "e").map(|n| n.id()).collect();
        assert_eq!(ids, vec![None, Some("second"), Some("inner")]);

        assert_eq!(root.find_all(|n| n.class() == "e").count(), 3);
        assert_eq!(root.find(|n| n.class() == "e").unwrap().id(), None);
    }

    #[test]
    fn test_find_skips_text_nodes() {
        let tree = HtmlTree::parse("<p>text</p>");
        assert!(tree.root().find(|n| n.is_text()).is_none());
    }

    #[test]
    fn test_root_and_parent() {
        let tree = HtmlTree::parse("<article><p id='deep'>x</p></article>");
        let deep = tree.root().get_element_by_id("deep").unwrap();

        assert_eq!(deep.parent().unwrap().tag(), Some("article"));
        assert!(matches!(deep.root().kind(), NodeKind::Root));
        assert!(tree.root().parent().is_none());
    }

    #[test]
    fn test_attr_map_last_wins() {
        let mut tree = HtmlTree::new();
        let attrs = vec![
            ("class".to_string(), "first".to_string()),
            ("class".to_string(), "second".to_string()),
        ];
        let id = tree.push(NodeKind::Element { name: "div".to_string(), attrs }, HtmlTree::ROOT);
        let node = tree.node(id).unwrap();

        assert_eq!(node.attr_map().get("class"), Some(&"second"));
        assert_eq!(node.class(), "second");
    }

    #[test]
    fn test_parser_is_reusable() {
        let mut parser = TreeParser::new();
        let first = parser.parse("<p>one</p><p>two</p>");
        let second = parser.parse(b"<span>three</span>".as_slice());

        assert_eq!(first.root().element_children().len(), 2);
        assert_eq!(tags(second.root().element_children()), vec!["span"]);
    }

    #[test]
    fn test_tag_names_are_lower_cased() {
        let tree = HtmlTree::parse("<DIV Class='x'><P>one</p><IMG SRC='/a.png'>tail</DIV>");
        let div = tree.root().first_element_child().unwrap();

        assert_eq!(div.tag(), Some("div"));
        assert_eq!(div.class(), "x");
        assert_eq!(tags(div.element_children()), vec!["p", "img"]);
        assert_eq!(div.element_children()[1].children().count(), 0);
    }

    #[test]
    fn test_empty_input() {
        let tree = HtmlTree::parse("");
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 1);
    }
}
