//! xkcd comics: the [`Xkcd`] client and its [`Comic`] handles.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use xxkcd_core::{ClientConfig, MemoryTransport, Xkcd};
//!
//! let transport = Arc::new(MemoryTransport::new());
//! transport.insert(
//!     "https://xkcd.com/353/info.0.json",
//!     r#"{"num": 353, "title": "Python", "safe_title": "Python", "img": "https://imgs.xkcd.com/comics/python.png",
//!        "alt": "I wrote 20 short programs in Python yesterday.", "day": "5", "month": "12", "year": "2007"}"#,
//! );
//!
//! let xkcd = Xkcd::with_transport(ClientConfig::default(), transport);
//! let comic = xkcd.comic(353)?;
//! assert_eq!(comic.title()?, "Python");
//! assert!(comic.same_instance(&xkcd.comic("353")?));
//! # Ok::<(), xxkcd_core::XkcdError>(())
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicUsize};
use std::thread;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Date, Month};
use tracing::{debug, warn};
use url::Url;

use crate::cached::CachedField;
use crate::config::ClientConfig;
use crate::constants::{self, BLANK_IMAGE, EXPLAIN_XKCD_BASE, XKCD_BASE, XKCD_LATEST_JSON, XKCD_MOBILE_BASE};
use crate::decode::fix_encoding;
use crate::fetch::{ImageStream, Transport, read_bytes, read_json};
use crate::key::{Key, KeyInput, KeyRange, coerce};
use crate::registry::{Evict, Registry};
use crate::{Result, XkcdError};

/// Comic 404 does not exist upstream; it is served from memory.
const NOT_FOUND_NUMBER: u32 = 404;

/// A comic record exactly as the JSON endpoint returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub month: String,
    pub num: u32,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub news: String,
    #[serde(default)]
    pub safe_title: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub day: String,
}

impl RawMetadata {
    /// Stand-in record for comic 404.
    pub fn not_found() -> Self {
        Self {
            month: "4".to_string(),
            num: NOT_FOUND_NUMBER,
            link: String::new(),
            year: "2008".to_string(),
            news: String::new(),
            safe_title: "404 not found".to_string(),
            transcript: String::new(),
            alt: String::new(),
            img: String::new(),
            title: "404 - Not Found".to_string(),
            day: "1".to_string(),
        }
    }
}

/// A comic record with text repaired and date parts parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub month: Option<u8>,
    pub num: u32,
    pub link: String,
    pub year: Option<i32>,
    pub news: String,
    pub safe_title: String,
    pub transcript: String,
    pub alt: String,
    /// Empty when the comic has no image.
    pub img: String,
    pub title: String,
    pub day: Option<u8>,
}

/// Cached fields of a comic, see [`Comic::delete_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComicField {
    Raw,
    Metadata,
}

#[derive(Debug)]
struct ComicEntry {
    key: Key,
    raw: CachedField<Arc<RawMetadata>>,
    metadata: CachedField<Arc<Metadata>>,
}

impl ComicEntry {
    fn new(key: Key) -> Self {
        Self { key, raw: CachedField::new(), metadata: CachedField::new() }
    }
}

impl Evict for ComicEntry {
    fn evict(&self) {
        self.raw.take();
        self.metadata.take();
    }
}

struct Shared {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    registry: Registry<ComicEntry>,
}

/// Client for the xkcd JSON API.
///
/// Cloning is cheap; clones share the transport and the identity cache.
/// Two clients built separately never share comics.
#[derive(Clone)]
pub struct Xkcd {
    shared: Arc<Shared>,
}

impl fmt::Debug for Xkcd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xkcd")
            .field("config", &self.shared.config)
            .field("live", &self.shared.registry.live_len())
            .field("pinned", &self.shared.registry.pinned_len())
            .finish()
    }
}

impl Xkcd {
    /// Client over HTTP with the default configuration.
    #[cfg(feature = "fetch")]
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Client over HTTP, using `config.fetch` for the connection settings.
    #[cfg(feature = "fetch")]
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = crate::fetch::HttpTransport::new(&config.fetch)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { shared: Arc::new(Shared { config, transport, registry: Registry::new() }) }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// The comic for `key`, sharing the live instance if there is one.
    pub fn comic(&self, key: impl Into<KeyInput>) -> Result<Comic> {
        self.lookup(key.into(), false)
    }

    /// Like [`Xkcd::comic`], and keeps the instance alive until it is deleted.
    pub fn comic_pinned(&self, key: impl Into<KeyInput>) -> Result<Comic> {
        self.lookup(key.into(), true)
    }

    fn lookup(&self, input: KeyInput, keep_alive: bool) -> Result<Comic> {
        let key = coerce(input, self.shared.config.safe_threshold, || self.latest())?;
        Ok(self.at(key, keep_alive))
    }

    fn at(&self, key: Key, keep_alive: bool) -> Comic {
        let entry = self.shared.registry.get_or_create(key, keep_alive, || ComicEntry::new(key));
        Comic { client: self.clone(), entry }
    }

    /// Number of the newest comic.
    ///
    /// The latest comic is pinned, so this fetches once per client until the
    /// latest entry is deleted.
    pub fn latest(&self) -> Result<u32> {
        Ok(self.at(Key::Latest, true).raw_metadata()?.num)
    }

    /// A uniformly random comic.
    pub fn random(&self) -> Result<Comic> {
        let latest = self.latest()?;
        if latest == 0 {
            return Err(XkcdError::Exhausted("comics to choose from".to_string()));
        }
        let number = rand::rng().random_range(1..=latest);
        Ok(self.at(Key::Number(number), false))
    }

    /// Comics from `from` towards `to` (exclusive) by `step`.
    ///
    /// A `to` of latest includes the latest comic. Keys are coerced up
    /// front; comics are created as the sequence is walked.
    pub fn range(&self, from: impl Into<KeyInput>, to: impl Into<KeyInput>, step: i64) -> Result<Comics> {
        if step == 0 {
            return Err(XkcdError::InvalidStep);
        }
        let threshold = self.shared.config.safe_threshold;
        let start = match coerce(from.into(), threshold, || self.latest())? {
            Key::Number(n) => n,
            Key::Latest => self.latest()?,
        };
        let end = match coerce(to.into(), threshold, || self.latest())? {
            Key::Number(n) => n,
            Key::Latest => self.latest()?.saturating_add(1),
        };

        Ok(Comics { client: self.clone(), keys: KeyRange::new(start, end, step)? })
    }

    /// Every comic from 1 through the latest.
    pub fn iter(&self) -> Result<Comics> {
        self.range(1, KeyInput::Latest, 1)
    }

    /// Pins and resolves every comic from 1 through the latest.
    ///
    /// With `parallel`, raw records that are not cached yet are fetched by
    /// `config.workers` threads first. Fetch failures do not stop the other
    /// workers; the first one is returned once the rest are merged.
    pub fn load_all(&self, parallel: bool) -> Result<()> {
        let latest = self.latest()?;
        let comics: Vec<Comic> = (1..=latest).map(|n| self.at(Key::Number(n), true)).collect();
        debug!(count = comics.len(), parallel, "loading all comics");

        if parallel {
            self.fetch_missing(&comics)?;
        }
        for comic in &comics {
            comic.metadata()?;
        }
        Ok(())
    }

    fn fetch_missing(&self, comics: &[Comic]) -> Result<()> {
        let pending: Vec<&Comic> = comics.iter().filter(|comic| !comic.entry.raw.is_ready()).collect();
        if pending.is_empty() {
            return Ok(());
        }

        let keys: Vec<Key> = pending.iter().map(|comic| comic.key()).collect();
        let workers = self.shared.config.workers.clamp(1, keys.len());
        let transport: &dyn Transport = &*self.shared.transport;
        let cursor = AtomicUsize::new(0);
        debug!(pending = keys.len(), workers, "fetching raw metadata");

        let fetched: Vec<(usize, Result<RawMetadata>)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut results = Vec::new();
                        loop {
                            let index = cursor.fetch_add(1, atomic::Ordering::Relaxed);
                            let Some(&key) = keys.get(index) else { break };
                            results.push((index, fetch_raw(transport, key)));
                        }
                        results
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
                .collect()
        });

        let mut first_error = None;
        for (index, result) in fetched {
            match result {
                Ok(raw) => pending[index].entry.raw.set(Arc::new(raw)),
                Err(err) => {
                    warn!(key = %keys[index], error = %err, "failed to fetch comic");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Pins the comic numbered `raw.num` with `raw` as its raw record,
    /// without fetching. Used to load offline snapshots.
    pub fn preload(&self, raw: RawMetadata) -> Comic {
        let comic = self.at(Key::Number(raw.num), true);
        comic.preload(raw);
        comic
    }

    /// Forgets every comic, pinned or not, and clears their cached fields.
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

fn fetch_raw(transport: &dyn Transport, key: Key) -> Result<RawMetadata> {
    match key {
        Key::Number(NOT_FOUND_NUMBER) => Ok(RawMetadata::not_found()),
        Key::Number(n) => read_json(transport, &constants::comic_json(n)),
        Key::Latest => read_json(transport, XKCD_LATEST_JSON),
    }
}

/// Upstream transcripts are shifted for later comics; this is the comic
/// whose record carries the transcript of `number`.
fn transcript_source(number: u32) -> u32 {
    let shift = match number {
        n if n >= 1663 => 3,
        n if n >= 1608 => 2,
        _ => 0,
    };
    number.checked_add(shift).unwrap_or(number)
}

fn parse_part<T: FromStr>(field: &'static str, value: &str) -> Result<Option<T>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| XkcdError::Malformed { field, value: value.to_string() })
}

fn image_basename(link: &str) -> Option<String> {
    let name = match Url::parse(link) {
        Ok(url) => url.path_segments().and_then(|mut segments| segments.next_back()).map(str::to_string),
        Err(_) => link.rsplit('/').next().map(str::to_string),
    };
    name.filter(|name| !name.is_empty())
}

fn mime_for(extension: Option<&str>) -> &'static str {
    match extension {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Handle to one comic.
///
/// Handles for the same key share one instance and its cached fields.
#[derive(Clone)]
pub struct Comic {
    client: Xkcd,
    entry: Arc<ComicEntry>,
}

impl Comic {
    pub fn key(&self) -> Key {
        self.entry.key
    }

    pub fn client(&self) -> &Xkcd {
        &self.client
    }

    /// The comic number, fetching the latest record if this is the latest
    /// comic.
    pub fn number(&self) -> Result<u32> {
        match self.entry.key {
            Key::Number(n) => Ok(n),
            Key::Latest => Ok(self.raw_metadata()?.num),
        }
    }

    /// Whether both handles share one instance.
    pub fn same_instance(&self, other: &Comic) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Whether both handles refer to the same comic, resolving latest.
    pub fn same_comic(&self, other: &Comic) -> Result<bool> {
        if self.key() == other.key() {
            return Ok(true);
        }
        Ok(self.number()? == other.number()?)
    }

    /// The JSON record, fetched on first access.
    pub fn raw_metadata(&self) -> Result<Arc<RawMetadata>> {
        self.entry.raw.get_or_try_init(|| {
            debug!(key = %self.entry.key, "resolving raw metadata");
            fetch_raw(&*self.client.shared.transport, self.entry.key).map(Arc::new)
        })
    }

    /// The repaired record, computed on first access.
    pub fn metadata(&self) -> Result<Arc<Metadata>> {
        self.entry.metadata.get_or_try_init(|| self.compute_metadata().map(Arc::new))
    }

    fn compute_metadata(&self) -> Result<Metadata> {
        let raw = self.raw_metadata()?;

        let transcript = match self.entry.key {
            Key::Number(n) => {
                let source = transcript_source(n);
                if source != n && i64::from(source) < i64::from(self.client.latest()?) - 3 {
                    self.client.at(Key::Number(source), false).raw_metadata()?.transcript.clone()
                } else {
                    raw.transcript.clone()
                }
            }
            Key::Latest => raw.transcript.clone(),
        };
        let img = if raw.img == BLANK_IMAGE { String::new() } else { raw.img.clone() };

        debug!(key = %self.entry.key, "computed metadata");
        Ok(Metadata {
            month: parse_part("month", &raw.month)?,
            num: raw.num,
            link: raw.link.clone(),
            year: parse_part("year", &raw.year)?,
            news: raw.news.clone(),
            safe_title: fix_encoding(&raw.safe_title),
            transcript: fix_encoding(&transcript),
            alt: fix_encoding(&raw.alt),
            img,
            title: fix_encoding(&raw.title),
            day: parse_part("day", &raw.day)?,
        })
    }

    pub fn title(&self) -> Result<String> {
        Ok(self.metadata()?.title.clone())
    }

    pub fn safe_title(&self) -> Result<String> {
        Ok(self.metadata()?.safe_title.clone())
    }

    pub fn transcript(&self) -> Result<String> {
        Ok(self.metadata()?.transcript.clone())
    }

    /// The hover text.
    pub fn alt(&self) -> Result<String> {
        Ok(self.metadata()?.alt.clone())
    }

    pub fn link(&self) -> Result<String> {
        Ok(self.metadata()?.link.clone())
    }

    pub fn news(&self) -> Result<String> {
        Ok(self.metadata()?.news.clone())
    }

    /// Absolute image URL, or an empty string for comics without one.
    pub fn image_link(&self) -> Result<String> {
        Ok(self.metadata()?.img.clone())
    }

    pub fn day(&self) -> Result<Option<u8>> {
        Ok(self.metadata()?.day)
    }

    pub fn month(&self) -> Result<Option<u8>> {
        Ok(self.metadata()?.month)
    }

    pub fn year(&self) -> Result<Option<i32>> {
        Ok(self.metadata()?.year)
    }

    /// Last path segment of the image URL.
    pub fn image_filename(&self) -> Result<Option<String>> {
        let link = self.image_link()?;
        if link.is_empty() {
            return Ok(None);
        }
        Ok(image_basename(&link))
    }

    /// Lower-cased extension of the image file name.
    pub fn image_extension(&self) -> Result<Option<String>> {
        Ok(self
            .image_filename()?
            .and_then(|name| name.rsplit_once('.').map(|(_, extension)| extension.to_ascii_lowercase())))
    }

    pub fn image_mime(&self) -> Result<&'static str> {
        Ok(mime_for(self.image_extension()?.as_deref()))
    }

    pub fn publication_date(&self) -> Result<Date> {
        let metadata = self.metadata()?;
        let (Some(year), Some(month), Some(day)) = (metadata.year, metadata.month, metadata.day) else {
            return Err(XkcdError::InvalidDate(format!("{self} has an incomplete date")));
        };
        let month = Month::try_from(month).map_err(|err| XkcdError::InvalidDate(err.to_string()))?;
        Date::from_calendar_date(year, month, day).map_err(|err| XkcdError::InvalidDate(err.to_string()))
    }

    pub fn url(&self) -> String {
        match self.entry.key {
            Key::Number(n) => constants::comic_page(n),
            Key::Latest => XKCD_BASE.to_string(),
        }
    }

    pub fn mobile_url(&self) -> String {
        match self.entry.key {
            Key::Number(n) => constants::comic_mobile_page(n),
            Key::Latest => XKCD_MOBILE_BASE.to_string(),
        }
    }

    pub fn explain_url(&self) -> String {
        match self.entry.key {
            Key::Number(n) => constants::explain_page(n),
            Key::Latest => EXPLAIN_XKCD_BASE.to_string(),
        }
    }

    fn require_image(&self) -> Result<String> {
        let link = self.image_link()?;
        if link.is_empty() {
            return Err(XkcdError::NoImage(self.to_string()));
        }
        Ok(link)
    }

    /// Opens the image and reads it lazily in `chunk_size` pieces.
    pub fn stream_image(&self, chunk_size: usize) -> Result<ImageStream> {
        let link = self.require_image()?;
        let reader = self.client.shared.transport.open(&link)?;
        Ok(ImageStream::new(reader, chunk_size))
    }

    /// Streams the image into `sink`, returning the number of bytes written.
    pub fn copy_image_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<u64> {
        let mut written = 0u64;
        for chunk in self.stream_image(self.client.shared.config.chunk_size)? {
            let chunk = chunk?;
            sink.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        sink.flush()?;
        Ok(written)
    }

    pub fn read_image(&self) -> Result<Vec<u8>> {
        let link = self.require_image()?;
        read_bytes(&*self.client.shared.transport, &link)
    }

    /// The comic after this one.
    pub fn next(&self) -> Result<Comic> {
        let Key::Number(n) = self.entry.key else {
            return Err(XkcdError::Exhausted("after the latest comic".to_string()));
        };
        if n >= self.client.latest()? {
            return Err(XkcdError::Exhausted(format!("after comic {n}")));
        }
        Ok(self.client.at(Key::Number(n + 1), false))
    }

    /// The comic before this one.
    pub fn previous(&self) -> Result<Comic> {
        let n = match self.entry.key {
            Key::Number(n) => n,
            Key::Latest => self.client.latest()?,
        };
        if n <= 1 {
            return Err(XkcdError::Exhausted(format!("before comic {n}")));
        }
        Ok(self.client.at(Key::Number(n - 1), false))
    }

    /// Clears every cached field and forgets this instance; the next lookup
    /// for the key builds a new one.
    pub fn delete(&self) {
        self.client.shared.registry.delete(self.entry.key, &self.entry);
    }

    pub fn delete_field(&self, field: ComicField) {
        match field {
            ComicField::Raw => {
                self.entry.raw.take();
            }
            ComicField::Metadata => {
                self.entry.metadata.take();
            }
        }
    }

    pub fn is_loaded(&self, field: ComicField) -> bool {
        match field {
            ComicField::Raw => self.entry.raw.is_ready(),
            ComicField::Metadata => self.entry.metadata.is_ready(),
        }
    }

    /// Uses `raw` as the raw record instead of fetching it. Stale metadata
    /// is dropped.
    pub fn preload(&self, raw: RawMetadata) {
        self.entry.raw.set(Arc::new(raw));
        self.entry.metadata.take();
    }

    pub fn is_pinned(&self) -> bool {
        self.client.shared.registry.is_pinned(self.entry.key)
    }
}

impl fmt::Debug for Comic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comic")
            .field("key", &self.entry.key)
            .field("raw", &self.entry.raw.is_ready())
            .field("metadata", &self.entry.metadata.is_ready())
            .finish()
    }
}

impl fmt::Display for Comic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xkcd {}", self.entry.key)
    }
}

impl PartialEq for Comic {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Comic {}

impl PartialOrd for Comic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Comic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Comic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl From<&Comic> for KeyInput {
    fn from(comic: &Comic) -> Self {
        KeyInput::Canonical(comic.key())
    }
}

/// Lazy sequence of comics, see [`Xkcd::range`].
#[derive(Debug, Clone)]
pub struct Comics {
    client: Xkcd,
    keys: KeyRange,
}

impl Iterator for Comics {
    type Item = Comic;

    fn next(&mut self) -> Option<Comic> {
        self.keys.next().map(|n| self.client.at(Key::Number(n), false))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl DoubleEndedIterator for Comics {
    fn next_back(&mut self) -> Option<Comic> {
        self.keys.next_back().map(|n| self.client.at(Key::Number(n), false))
    }
}

impl ExactSizeIterator for Comics {}
