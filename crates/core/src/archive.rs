//! The what-if archive listing.
//!
//! The listing page holds one `archive-entry` block per article, oldest
//! first. Each block has three element children: a link wrapping the
//! thumbnail, the title and the publication date written as
//! `"Month D, YYYY"`.

use regex::Regex;
use serde::Serialize;
use time::{Date, Month};
use tracing::debug;
use url::Url;

use crate::constants::WHAT_IF_BASE;
use crate::html::{HtmlTree, Node, TreeParser};
use crate::{Result, XkcdError};

/// One article as listed in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    /// Absolute URL of the thumbnail.
    pub image: String,
    pub title: String,
    pub date: Date,
}

/// Every archive entry in listing order. Article `n` is entry `n`, counting
/// from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    /// Parses an archive listing page.
    pub fn parse(html: impl AsRef<[u8]>) -> Result<Self> {
        let tree = TreeParser::new().parse(html);
        Self::from_tree(&tree)
    }

    pub fn from_tree(tree: &HtmlTree) -> Result<Self> {
        let dates = DateParser::new()?;
        let base = Url::parse(WHAT_IF_BASE).map_err(|e| XkcdError::InvalidUrl(e.to_string()))?;

        let entries = tree
            .root()
            .find_all(|node| node.class() == "archive-entry")
            .map(|node| parse_entry(node, &base, &dates))
            .collect::<Result<Vec<_>>>()?;

        debug!(entries = entries.len(), "parsed archive");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry of article `number` (1-based).
    pub fn get(&self, number: u32) -> Option<&ArchiveEntry> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArchiveEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a ArchiveEntry;
    type IntoIter = std::slice::Iter<'a, ArchiveEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn parse_entry(node: Node<'_>, base: &Url, dates: &DateParser) -> Result<ArchiveEntry> {
    let children = node.element_children();
    let [picture, heading, dated, ..] = children.as_slice() else {
        return Err(XkcdError::MissingElement(format!(
            "archive entry with {} element children, expected 3",
            children.len()
        )));
    };

    let src = picture
        .find(|node| node.attr("src").is_some())
        .and_then(|node| node.attr("src"))
        .ok_or_else(|| XkcdError::MissingElement("archive entry image".to_string()))?;
    let image = base.join(src).map_err(|e| XkcdError::InvalidUrl(e.to_string()))?;

    Ok(ArchiveEntry {
        image: image.to_string(),
        title: heading.text_content().trim().to_string(),
        date: dates.parse(&dated.text_content())?,
    })
}

/// Parser for dates written as `"Month D, YYYY"` in English.
pub struct DateParser {
    pattern: Regex,
}

impl DateParser {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"^\s*([A-Za-z]+)\s+(\d{1,2}),\s*(\d{4})\s*$")
            .map_err(|e| XkcdError::InvalidDate(e.to_string()))?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, text: &str) -> Result<Date> {
        let captures = self
            .pattern
            .captures(text)
            .ok_or_else(|| XkcdError::InvalidDate(text.trim().to_string()))?;

        let month = month_from_name(&captures[1])?;
        let day: u8 = captures[2].parse().map_err(|_| XkcdError::InvalidDate(text.trim().to_string()))?;
        let year: i32 = captures[3].parse().map_err(|_| XkcdError::InvalidDate(text.trim().to_string()))?;

        Date::from_calendar_date(year, month, day).map_err(|e| XkcdError::InvalidDate(e.to_string()))
    }
}

fn month_from_name(name: &str) -> Result<Month> {
    let month = match name.to_ascii_lowercase().as_str() {
        "january" => Month::January,
        "february" => Month::February,
        "march" => Month::March,
        "april" => Month::April,
        "may" => Month::May,
        "june" => Month::June,
        "july" => Month::July,
        "august" => Month::August,
        "september" => Month::September,
        "october" => Month::October,
        "november" => Month::November,
        "december" => Month::December,
        _ => return Err(XkcdError::UnknownMonth(name.to_string())),
    };
    Ok(month)
}
