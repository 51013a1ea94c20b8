pub mod archive;
pub mod cached;
pub mod comic;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod html;
pub mod key;
pub mod registry;
pub mod what_if;

pub use archive::{Archive, ArchiveEntry, DateParser};
#[doc(hidden)]
pub use cached::CachedField;
pub use comic::{Comic, ComicField, Comics, Metadata, RawMetadata, Xkcd};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use decode::fix_encoding;
pub use error::{Result, XkcdError};
#[cfg(feature = "fetch")]
pub use fetch::HttpTransport;
pub use fetch::{FetchConfig, ImageStream, MemoryTransport, Transport};
pub use html::{HtmlTree, Node, NodeId, NodeKind, TreeParser};
pub use key::{Key, KeyInput, KeyRange, coerce};
#[doc(hidden)]
pub use registry::{Evict, Registry};
pub use what_if::{Article, ArticleField, ArticleNode, Articles, WhatIf};
