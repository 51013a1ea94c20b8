//! what-if articles: the [`WhatIf`] client and its [`Article`] handles.
//!
//! Article numbers come from the archive listing, which is fetched once per
//! client. Article pages are scraped on demand; each step of the scrape
//! (page text, parsed tree, article node, extracted text) is cached and can
//! be cleared separately.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::Rng;
use time::Date;
use tracing::debug;

use crate::archive::{Archive, ArchiveEntry};
use crate::cached::CachedField;
use crate::config::ClientConfig;
use crate::constants::{self, WHAT_IF_ARCHIVE, WHAT_IF_BASE, WHAT_IF_NEWS};
use crate::fetch::{Transport, read_bytes, read_text};
use crate::html::{HtmlTree, Node, NodeId, TreeParser};
use crate::key::{Key, KeyInput, KeyRange, coerce};
use crate::registry::{Evict, Registry};
use crate::{Result, XkcdError};

/// Cached fields of an article, see [`Article::delete_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleField {
    FullPage,
    ArticleTree,
    ArticleNode,
    Question,
    Attribute,
    Body,
}

/// The `<article class="entry">` element of a parsed article page.
///
/// Carries its own tree, so clearing the cached tree never leaves a node
/// pointing into a different parse.
#[derive(Debug, Clone)]
pub struct ArticleNode {
    tree: Arc<HtmlTree>,
    id: NodeId,
}

impl ArticleNode {
    pub fn tree(&self) -> &HtmlTree {
        &self.tree
    }

    pub fn node(&self) -> Option<Node<'_>> {
        self.tree.node(self.id)
    }
}

#[derive(Debug)]
struct ArticleEntry {
    key: Key,
    full_page: CachedField<Arc<str>>,
    article_tree: CachedField<Arc<HtmlTree>>,
    article_node: CachedField<ArticleNode>,
    question: CachedField<String>,
    attribute: CachedField<String>,
    body: CachedField<String>,
}

impl ArticleEntry {
    fn new(key: Key) -> Self {
        Self {
            key,
            full_page: CachedField::new(),
            article_tree: CachedField::new(),
            article_node: CachedField::new(),
            question: CachedField::new(),
            attribute: CachedField::new(),
            body: CachedField::new(),
        }
    }
}

impl Evict for ArticleEntry {
    fn evict(&self) {
        self.full_page.take();
        self.article_tree.take();
        self.article_node.take();
        self.question.take();
        self.attribute.take();
        self.body.take();
    }
}

struct Shared {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    registry: Registry<ArticleEntry>,
    archive: CachedField<Arc<Archive>>,
}

/// Client for the what-if site.
///
/// Cloning is cheap; clones share the transport, the archive and the
/// identity cache.
#[derive(Clone)]
pub struct WhatIf {
    shared: Arc<Shared>,
}

impl fmt::Debug for WhatIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatIf")
            .field("config", &self.shared.config)
            .field("archive", &self.shared.archive.is_ready())
            .field("live", &self.shared.registry.live_len())
            .field("pinned", &self.shared.registry.pinned_len())
            .finish()
    }
}

impl WhatIf {
    #[cfg(feature = "fetch")]
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    #[cfg(feature = "fetch")]
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = crate::fetch::HttpTransport::new(&config.fetch)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(Shared { config, transport, registry: Registry::new(), archive: CachedField::new() }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// The archive listing, fetched and parsed on first access.
    pub fn archive(&self) -> Result<Arc<Archive>> {
        self.shared.archive.get_or_try_init(|| {
            let page = read_text(&*self.shared.transport, WHAT_IF_ARCHIVE)?;
            Archive::parse(page).map(Arc::new)
        })
    }

    /// Drops the cached archive; the next access fetches it again.
    pub fn delete_archive(&self) {
        self.shared.archive.take();
        debug!("deleted archive");
    }

    /// Number of the newest article.
    pub fn latest(&self) -> Result<u32> {
        let len = self.archive()?.len();
        Ok(u32::try_from(len).unwrap_or(u32::MAX))
    }

    /// The article for `key`. Numbers are always checked against the archive.
    pub fn article(&self, key: impl Into<KeyInput>) -> Result<Article> {
        self.lookup(key.into(), false)
    }

    /// Like [`WhatIf::article`], and keeps the instance alive until it is
    /// deleted.
    pub fn article_pinned(&self, key: impl Into<KeyInput>) -> Result<Article> {
        self.lookup(key.into(), true)
    }

    fn lookup(&self, input: KeyInput, keep_alive: bool) -> Result<Article> {
        let key = coerce(input, None, || self.latest())?;
        Ok(self.at(key, keep_alive))
    }

    fn at(&self, key: Key, keep_alive: bool) -> Article {
        let entry = self.shared.registry.get_or_create(key, keep_alive, || ArticleEntry::new(key));
        Article { client: self.clone(), entry }
    }

    pub fn random(&self) -> Result<Article> {
        let latest = self.latest()?;
        if latest == 0 {
            return Err(XkcdError::Exhausted("articles to choose from".to_string()));
        }
        let number = rand::rng().random_range(1..=latest);
        Ok(self.at(Key::Number(number), false))
    }

    /// Articles from `from` towards `to` (exclusive) by `step`; a `to` of
    /// latest includes the latest article.
    pub fn range(&self, from: impl Into<KeyInput>, to: impl Into<KeyInput>, step: i64) -> Result<Articles> {
        if step == 0 {
            return Err(XkcdError::InvalidStep);
        }
        let start = match coerce(from.into(), None, || self.latest())? {
            Key::Number(n) => n,
            Key::Latest => self.latest()?,
        };
        let end = match coerce(to.into(), None, || self.latest())? {
            Key::Number(n) => n,
            Key::Latest => self.latest()?.saturating_add(1),
        };

        Ok(Articles { client: self.clone(), keys: KeyRange::new(start, end, step)? })
    }

    pub fn iter(&self) -> Result<Articles> {
        self.range(1, KeyInput::Latest, 1)
    }

    /// The raw what-if news ticker.
    pub fn news(&self) -> Result<Vec<u8>> {
        read_bytes(&*self.shared.transport, WHAT_IF_NEWS)
    }

    /// Forgets every article and clears their cached fields. The archive is
    /// kept.
    pub fn delete_all(&self) {
        self.shared.registry.delete_all();
    }

    pub fn pinned_len(&self) -> usize {
        self.shared.registry.pinned_len()
    }

    pub fn live_len(&self) -> usize {
        self.shared.registry.live_len()
    }
}

/// Handle to one what-if article.
#[derive(Clone)]
pub struct Article {
    client: WhatIf,
    entry: Arc<ArticleEntry>,
}

impl Article {
    pub fn key(&self) -> Key {
        self.entry.key
    }

    pub fn client(&self) -> &WhatIf {
        &self.client
    }

    pub fn number(&self) -> Result<u32> {
        match self.entry.key {
            Key::Number(n) => Ok(n),
            Key::Latest => self.client.latest(),
        }
    }

    pub fn same_instance(&self, other: &Article) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    pub fn same_article(&self, other: &Article) -> Result<bool> {
        if self.key() == other.key() {
            return Ok(true);
        }
        Ok(self.number()? == other.number()?)
    }

    pub fn url(&self) -> String {
        match self.entry.key {
            Key::Number(n) => constants::article_page(n),
            Key::Latest => WHAT_IF_BASE.to_string(),
        }
    }

    /// This article's archive listing.
    pub fn entry(&self) -> Result<ArchiveEntry> {
        let number = self.number()?;
        self.client
            .archive()?
            .get(number)
            .cloned()
            .ok_or_else(|| XkcdError::Exhausted(format!("what-if {number} is not in the archive")))
    }

    pub fn title(&self) -> Result<String> {
        Ok(self.entry()?.title)
    }

    /// Absolute URL of the archive thumbnail.
    pub fn image(&self) -> Result<String> {
        Ok(self.entry()?.image)
    }

    pub fn date(&self) -> Result<Date> {
        Ok(self.entry()?.date)
    }

    pub fn day(&self) -> Result<u8> {
        Ok(self.date()?.day())
    }

    pub fn month(&self) -> Result<u8> {
        Ok(u8::from(self.date()?.month()))
    }

    pub fn year(&self) -> Result<i32> {
        Ok(self.date()?.year())
    }

    /// The article page as text.
    pub fn full_page(&self) -> Result<Arc<str>> {
        self.entry.full_page.get_or_try_init(|| {
            let page = read_text(&*self.client.shared.transport, &self.url())?;
            Ok(Arc::from(page))
        })
    }

    pub fn article_tree(&self) -> Result<Arc<HtmlTree>> {
        self.entry.article_tree.get_or_try_init(|| {
            let page = self.full_page()?;
            debug!(key = %self.entry.key, bytes = page.len(), "parsing article page");
            Ok(Arc::new(TreeParser::new().parse(page.as_bytes())))
        })
    }

    pub fn article_node(&self) -> Result<ArticleNode> {
        self.entry.article_node.get_or_try_init(|| {
            let tree = self.article_tree()?;
            let id = tree
                .root()
                .find(|node| node.tag() == Some("article") && node.class() == "entry")
                .map(|node| node.node_id())
                .ok_or_else(|| XkcdError::MissingElement(format!("<article class=\"entry\"> in {}", self.url())))?;
            Ok(ArticleNode { tree, id })
        })
    }

    /// The reader's question.
    pub fn question(&self) -> Result<String> {
        self.entry.question.get_or_try_init(|| self.element_text("question"))
    }

    /// Who asked the question.
    pub fn attribute(&self) -> Result<String> {
        self.entry.attribute.get_or_try_init(|| self.element_text("attribute"))
    }

    /// The answer: every other paragraph of the article, separated by blank
    /// lines.
    pub fn body(&self) -> Result<String> {
        self.entry.body.get_or_try_init(|| {
            let article = self.article_node()?;
            let node = article.node().ok_or_else(|| XkcdError::MissingElement("article node".to_string()))?;

            let paragraphs: Vec<String> = node
                .element_children()
                .into_iter()
                .filter(|child| child.tag() == Some("p"))
                .filter(|child| !matches!(child.id(), Some("question" | "attribute")))
                .map(|child| child.text_content().trim().to_string())
                .collect();
            Ok(paragraphs.join("\n\n"))
        })
    }

    fn element_text(&self, id: &str) -> Result<String> {
        let article = self.article_node()?;
        article
            .node()
            .and_then(|node| node.get_element_by_id(id))
            .map(|node| node.text_content().trim().to_string())
            .ok_or_else(|| XkcdError::MissingElement(format!("#{id} in {}", self.url())))
    }

    pub fn next(&self) -> Result<Article> {
        let Key::Number(n) = self.entry.key else {
            return Err(XkcdError::Exhausted("after the latest article".to_string()));
        };
        if n >= self.client.latest()? {
            return Err(XkcdError::Exhausted(format!("after what-if {n}")));
        }
        Ok(self.client.at(Key::Number(n + 1), false))
    }

    pub fn previous(&self) -> Result<Article> {
        let n = self.number()?;
        if n <= 1 {
            return Err(XkcdError::Exhausted(format!("before what-if {n}")));
        }
        Ok(self.client.at(Key::Number(n - 1), false))
    }

    pub fn delete(&self) {
        self.client.shared.registry.delete(self.entry.key, &self.entry);
    }

    pub fn delete_field(&self, field: ArticleField) {
        match field {
            ArticleField::FullPage => drop(self.entry.full_page.take()),
            ArticleField::ArticleTree => drop(self.entry.article_tree.take()),
            ArticleField::ArticleNode => drop(self.entry.article_node.take()),
            ArticleField::Question => drop(self.entry.question.take()),
            ArticleField::Attribute => drop(self.entry.attribute.take()),
            ArticleField::Body => drop(self.entry.body.take()),
        }
    }

    pub fn is_loaded(&self, field: ArticleField) -> bool {
        match field {
            ArticleField::FullPage => self.entry.full_page.is_ready(),
            ArticleField::ArticleTree => self.entry.article_tree.is_ready(),
            ArticleField::ArticleNode => self.entry.article_node.is_ready(),
            ArticleField::Question => self.entry.question.is_ready(),
            ArticleField::Attribute => self.entry.attribute.is_ready(),
            ArticleField::Body => self.entry.body.is_ready(),
        }
    }

    /// Clears every cached field, then fetches and scrapes the page again.
    /// The instance stays registered.
    pub fn refresh(&self) -> Result<()> {
        self.entry.evict();
        self.question()?;
        self.attribute()?;
        self.body()?;
        Ok(())
    }

    pub fn is_pinned(&self) -> bool {
        self.client.shared.registry.is_pinned(self.entry.key)
    }
}

impl fmt::Debug for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Article")
            .field("key", &self.entry.key)
            .field("full_page", &self.entry.full_page.is_ready())
            .finish()
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "what-if {}", self.entry.key)
    }
}

impl PartialEq for Article {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Article {}

impl PartialOrd for Article {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Article {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Article {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl From<&Article> for KeyInput {
    fn from(article: &Article) -> Self {
        KeyInput::Canonical(article.key())
    }
}

/// Lazy sequence of articles, see [`WhatIf::range`].
#[derive(Debug, Clone)]
pub struct Articles {
    client: WhatIf,
    keys: KeyRange,
}

impl Iterator for Articles {
    type Item = Article;

    fn next(&mut self) -> Option<Article> {
        self.keys.next().map(|n| self.client.at(Key::Number(n), false))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl DoubleEndedIterator for Articles {
    fn next_back(&mut self) -> Option<Article> {
        self.keys.next_back().map(|n| self.client.at(Key::Number(n), false))
    }
}

impl ExactSizeIterator for Articles {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryTransport;

    fn listing(count: u32) -> String {
        let entries: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<div class="archive-entry"><a href="/{n}/"><img src="/imgs/a/{n}/archive_crop.png"></a><h1 class="archive-title">Article {n}</h1><h2 class="archive-date">March {n}, 2013</h2></div>"#
                )
            })
            .collect();
        format!("<html><body>{entries}</body></html>")
    }

    fn page(n: u32) -> String {
        format!(
            r#"<html><body><article class="entry">
            <a href="/{n}/"><h1>Article {n}</h1></a>
            <p id="question">What if {n}?</p>
            <p id="attribute">&mdash;Reader {n}</p>
            <p>First answer paragraph.</p>
            <p>Second <em>answer</em> paragraph.</p>
            </article></body></html>"#
        )
    }

    fn client(count: u32) -> (WhatIf, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(WHAT_IF_ARCHIVE, listing(count));
        for n in 1..=count {
            transport.insert(constants::article_page(n), page(n));
        }
        (WhatIf::with_transport(ClientConfig::default(), transport.clone()), transport)
    }

    #[test]
    fn test_latest_is_archive_length() {
        let (what_if, transport) = client(5);
        assert_eq!(what_if.latest().unwrap(), 5);
        assert_eq!(what_if.latest().unwrap(), 5);
        assert_eq!(transport.hits(WHAT_IF_ARCHIVE), 1);
    }

    #[test]
    fn test_delete_archive_refetches() {
        let (what_if, transport) = client(3);
        what_if.archive().unwrap();
        what_if.delete_archive();
        what_if.archive().unwrap();
        assert_eq!(transport.hits(WHAT_IF_ARCHIVE), 2);
    }

    #[test]
    fn test_numbers_are_clamped_to_archive() {
        let (what_if, _) = client(3);
        assert_eq!(what_if.article(99).unwrap().key(), Key::Number(3));
        assert_eq!(what_if.article(-1).unwrap().key(), Key::Number(3));
    }

    #[test]
    fn test_entry_fields() {
        let (what_if, _) = client(3);
        let article = what_if.article(2).unwrap();

        assert_eq!(article.title().unwrap(), "Article 2");
        assert_eq!(article.image().unwrap(), "https://what-if.xkcd.com/imgs/a/2/archive_crop.png");
        assert_eq!((article.year().unwrap(), article.month().unwrap(), article.day().unwrap()), (2013, 3, 2));
        assert_eq!(article.url(), "https://what-if.xkcd.com/2/");
    }

    #[test]
    fn test_scraped_fields() {
        let (what_if, transport) = client(3);
        let article = what_if.article(1).unwrap();

        assert_eq!(article.question().unwrap(), "What if 1?");
        assert_eq!(article.attribute().unwrap(), "\u{2014}Reader 1");
        assert_eq!(article.body().unwrap(), "First answer paragraph.\n\nSecond answer paragraph.");
        assert_eq!(transport.hits(&constants::article_page(1)), 1);
    }

    #[test]
    fn test_missing_article_element() {
        let (what_if, transport) = client(3);
        transport.insert(constants::article_page(3), "<html><body><p>moved</p></body></html>");
        let article = what_if.article(3).unwrap();

        assert!(matches!(article.question(), Err(XkcdError::MissingElement(_))));
        assert!(article.is_loaded(ArticleField::FullPage));
        assert!(!article.is_loaded(ArticleField::ArticleNode));
    }

    #[test]
    fn test_delete_field_keeps_upstream_fields() {
        let (what_if, transport) = client(3);
        let article = what_if.article(2).unwrap();
        article.body().unwrap();

        article.delete_field(ArticleField::ArticleTree);
        article.delete_field(ArticleField::Body);
        article.body().unwrap();

        assert!(article.is_loaded(ArticleField::ArticleNode));
        assert!(!article.is_loaded(ArticleField::ArticleTree));
        assert_eq!(transport.hits(&constants::article_page(2)), 1);
    }

    #[test]
    fn test_refresh_refetches_page() {
        let (what_if, transport) = client(3);
        let article = what_if.article(2).unwrap();
        article.question().unwrap();

        transport.insert(constants::article_page(2), page(2).replace("What if 2?", "What if two?"));
        article.refresh().unwrap();

        assert_eq!(article.question().unwrap(), "What if two?");
        assert_eq!(transport.hits(&constants::article_page(2)), 2);
        assert!(article.same_instance(&what_if.article(2).unwrap()));
    }

    #[test]
    fn test_navigation() {
        let (what_if, _) = client(3);
        let latest = what_if.article(KeyInput::Latest).unwrap();

        assert_eq!(latest.url(), "https://what-if.xkcd.com/");
        assert_eq!(latest.previous().unwrap().key(), Key::Number(2));
        assert!(matches!(what_if.article(3).unwrap().next(), Err(XkcdError::Exhausted(_))));
        assert!(matches!(what_if.article(1).unwrap().previous(), Err(XkcdError::Exhausted(_))));
        assert_eq!(what_if.iter().unwrap().rev().map(|a| a.key()).collect::<Vec<_>>().len(), 3);
    }

    #[test]
    fn test_navigation_from_clamped_and_canonical_keys() {
        let (what_if, _) = client(3);

        let clamped = what_if.article(99).unwrap();
        assert_eq!(clamped.key(), Key::Number(3));
        assert!(matches!(clamped.next(), Err(XkcdError::Exhausted(_))));
        assert_eq!(clamped.previous().unwrap().key(), Key::Number(2));

        let beyond = what_if.article(Key::Number(7)).unwrap();
        assert!(matches!(beyond.next(), Err(XkcdError::Exhausted(_))));
        assert!(matches!(what_if.article(Key::Number(0)), Err(XkcdError::InvalidKey(_))));
    }

    #[test]
    fn test_news_is_raw_bytes() {
        let (what_if, transport) = client(1);
        transport.insert(WHAT_IF_NEWS, "<b>new book</b>");
        assert_eq!(what_if.news().unwrap(), b"<b>new book</b>");
    }
}
