// Series detail-page scanner.
//
// Pulls the series title, its canonical detail URL, the announced episode
// total and the per-episode links out of a fetched page. Every extraction
// fails soft: a missing element yields a None field, never an error, because
// the site's markup drifts and tracking should degrade rather than stop.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static SEL_TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".det h2 a").unwrap());
static SEL_DETAIL_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".det span").unwrap());
static SEL_DOC_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_EPISODE_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".episodelist ul li").unwrap());
static SEL_EPISODE_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static SEL_PLAYINFO_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".playinfo span").unwrap());

// "  12 / 24" in the detail span: the second number is the announced total.
static RE_TOTAL_EPISODES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s(\d+)\s*/\s*(\d+)").unwrap());
static RE_EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Eps\s+(\d+)").unwrap());

/// Identity of the series as read off the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesInfo {
    pub title: Option<String>,
    pub series_url: Option<String>,
    pub total_episodes: Option<u32>,
}

/// One entry of the episode list.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeItem {
    pub url: Option<String>,
    pub number: Option<u32>,
}

/// Everything the tracker needs from one page load.
#[derive(Debug, Clone, Default)]
pub struct ScannedPage {
    pub info: SeriesInfo,
    pub episodes: Vec<EpisodeItem>,
}

impl ScannedPage {
    pub fn is_empty(&self) -> bool {
        self.info.series_url.is_none()
    }
}

/// Resolve `href` against the page's origin and strip any fragment.
/// Returns None for unparsable input.
pub fn normalize_url(href: &str, page_url: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(page_url).ok()?;
    // Resolve relative hrefs against the origin, the way the site links
    // its own detail pages.
    let origin = base.join("/").ok()?;
    let mut resolved = origin.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn parse_total_episodes(text: &str) -> Option<u32> {
    let caps = RE_TOTAL_EPISODES.captures(text)?;
    caps.get(2)?.as_str().parse().ok()
}

fn parse_episode_number(text: &str) -> Option<u32> {
    let caps = RE_EPISODE_NUMBER.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Scan a series detail page.
///
/// Title comes from the detail heading link, falling back to the document
/// title; the series URL from that link's href resolved against the page,
/// falling back to the page URL itself.
pub fn scan(html: &str, page_url: &str) -> ScannedPage {
    let document = Html::parse_document(html);

    let mut title = None;
    let mut series_url = None;

    if let Some(link) = document.select(&SEL_TITLE_LINK).next() {
        title = non_empty(element_text(link));
        if let Some(href) = link.value().attr("href") {
            series_url = normalize_url(href, page_url);
        }
    }

    if title.is_none() {
        title = document
            .select(&SEL_DOC_TITLE)
            .next()
            .and_then(|t| non_empty(element_text(t)));
    }

    if series_url.is_none() {
        series_url = normalize_url(page_url, page_url);
    }

    let total_episodes = document
        .select(&SEL_DETAIL_SPAN)
        .next()
        .and_then(|span| parse_total_episodes(&element_text(span)));

    let episodes = document
        .select(&SEL_EPISODE_ITEM)
        .map(|item| EpisodeItem {
            url: item
                .select(&SEL_EPISODE_LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| normalize_url(href, page_url)),
            number: item
                .select(&SEL_PLAYINFO_SPAN)
                .next()
                .and_then(|span| parse_episode_number(&element_text(span))),
        })
        .collect();

    ScannedPage {
        info: SeriesInfo {
            title,
            series_url,
            total_episodes,
        },
        episodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://anime.example.com/anime/beck/?page=1";

    fn series_page() -> String {
        r#"
        <html>
          <head><title>Watch BECK online</title></head>
          <body>
            <div class="det">
              <h2><a href="/anime/beck/#top">BECK: Mongolian Chop Squad</a></h2>
              <span>Status: Completed 26 / 26 episodes</span>
            </div>
            <div class="episodelist">
              <ul>
                <li>
                  <a href="/beck-episode-1/">watch</a>
                  <div class="playinfo"><span>Eps 1 - The View at Fourteen</span></div>
                </li>
                <li>
                  <a href="/beck-episode-2/#comments">watch</a>
                  <div class="playinfo"><span>Eps 2 - Live House</span></div>
                </li>
                <li>
                  <a href="/beck-special/">watch</a>
                  <div class="playinfo"><span>Special</span></div>
                </li>
              </ul>
            </div>
          </body>
        </html>
        "#
        .to_string()
    }

    #[test]
    fn test_scan_full_page() {
        let page = scan(&series_page(), PAGE_URL);

        assert_eq!(
            page.info.title.as_deref(),
            Some("BECK: Mongolian Chop Squad")
        );
        assert_eq!(
            page.info.series_url.as_deref(),
            Some("https://anime.example.com/anime/beck/")
        );
        assert_eq!(page.info.total_episodes, Some(26));
        assert_eq!(page.episodes.len(), 3);
    }

    #[test]
    fn test_episode_urls_are_normalized() {
        let page = scan(&series_page(), PAGE_URL);

        assert_eq!(
            page.episodes[0].url.as_deref(),
            Some("https://anime.example.com/beck-episode-1/")
        );
        // Fragments are stripped.
        assert_eq!(
            page.episodes[1].url.as_deref(),
            Some("https://anime.example.com/beck-episode-2/")
        );
        assert_eq!(page.episodes[0].number, Some(1));
        assert_eq!(page.episodes[1].number, Some(2));
        // Specials carry no "Eps N" marker.
        assert_eq!(page.episodes[2].number, None);
    }

    #[test]
    fn test_title_falls_back_to_document_title() {
        let html = r#"
        <html><head><title>  Watch BECK online  </title></head>
        <body><div class="det"><h2></h2></div></body></html>
        "#;
        let page = scan(html, PAGE_URL);
        assert_eq!(page.info.title.as_deref(), Some("Watch BECK online"));
    }

    #[test]
    fn test_series_url_falls_back_to_page_url() {
        let html = "<html><body><p>nothing here</p></body></html>";
        let page = scan(html, "https://anime.example.com/anime/beck/#fragment");
        assert_eq!(
            page.info.series_url.as_deref(),
            Some("https://anime.example.com/anime/beck/")
        );
        assert!(page.info.title.is_none());
        assert!(page.info.total_episodes.is_none());
        assert!(page.episodes.is_empty());
    }

    #[test]
    fn test_parse_total_episodes() {
        assert_eq!(parse_total_episodes("Status: Airing 3 / 12 episodes"), Some(12));
        assert_eq!(parse_total_episodes("Status: 10 /24"), Some(24));
        assert_eq!(parse_total_episodes("Completed"), None);
        assert_eq!(parse_total_episodes(""), None);
    }

    #[test]
    fn test_parse_episode_number() {
        assert_eq!(parse_episode_number("Eps 7 - Title"), Some(7));
        assert_eq!(parse_episode_number("eps 12"), Some(12));
        assert_eq!(parse_episode_number("Episode seven"), None);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("/anime/beck/", PAGE_URL).as_deref(),
            Some("https://anime.example.com/anime/beck/")
        );
        assert_eq!(
            normalize_url("https://other.example.com/x#y", PAGE_URL).as_deref(),
            Some("https://other.example.com/x")
        );
        assert_eq!(normalize_url("", PAGE_URL), None);
        assert_eq!(normalize_url("/anime/beck/", "not a url"), None);
    }
}
