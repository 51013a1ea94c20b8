//! Upstream endpoints and fixed values.

/// Root of the comic site.
pub const XKCD_BASE: &str = "https://xkcd.com";
/// Root of the mobile comic site.
pub const XKCD_MOBILE_BASE: &str = "https://m.xkcd.com";
/// JSON record of the newest comic.
pub const XKCD_LATEST_JSON: &str = "https://xkcd.com/info.0.json";
/// Root of the explainxkcd wiki.
pub const EXPLAIN_XKCD_BASE: &str = "https://www.explainxkcd.com";
/// What upstream puts in `img` for comics without a picture.
pub const BLANK_IMAGE: &str = "https://imgs.xkcd.com/comics/";

/// Root of the what-if site; also the page of the newest article.
pub const WHAT_IF_BASE: &str = "https://what-if.xkcd.com/";
/// Listing of every what-if article.
pub const WHAT_IF_ARCHIVE: &str = "https://what-if.xkcd.com/archive/";
/// What-if news ticker.
pub const WHAT_IF_NEWS: &str = "https://c.xkcd.com/whatif/news";

/// Comic numbers below this are known to exist, so coercing them skips the
/// upper bound lookup.
pub const DEFAULT_SAFE_THRESHOLD: u32 = 1951;

/// Default chunk size for image streaming.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Default number of bulk-load workers.
pub const DEFAULT_WORKERS: usize = 4;

pub fn comic_json(number: u32) -> String {
    format!("{XKCD_BASE}/{number}/info.0.json")
}

pub fn comic_page(number: u32) -> String {
    format!("{XKCD_BASE}/{number}/")
}

pub fn comic_mobile_page(number: u32) -> String {
    format!("{XKCD_MOBILE_BASE}/{number}/")
}

pub fn explain_page(number: u32) -> String {
    format!("{EXPLAIN_XKCD_BASE}/{number}")
}

pub fn article_page(number: u32) -> String {
    format!("{WHAT_IF_BASE}{number}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comic_urls() {
        assert_eq!(comic_json(353), "https://xkcd.com/353/info.0.json");
        assert_eq!(comic_page(353), "https://xkcd.com/353/");
        assert_eq!(comic_mobile_page(353), "https://m.xkcd.com/353/");
        assert_eq!(explain_page(353), "https://www.explainxkcd.com/353");
    }

    #[test]
    fn test_article_url() {
        assert_eq!(article_page(12), "https://what-if.xkcd.com/12/");
    }
}
