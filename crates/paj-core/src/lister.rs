//! Resource lister - turns the statistics index page into resource descriptors
//!
//! The page lists every dataset file as an `<li>` inside `ul.icon_list`:
//!
//! ```html
//! <ul class="icon_list">
//!   <li><a href="/english/statis/data/03/report_2020.xlsx">[xls] Some Report</a>
//!       <span>(2020/05/01 updated)</span></li>
//! </ul>
//! ```
//!
//! Only spreadsheet links (label contains `[xls]`) become resources. Any item
//! that does not look like the above aborts the listing.

use crate::error::FetchError;
use paj_types::{FetcherConfig, Resource};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};
use url::Url;

/// Marker that identifies spreadsheet links
pub const XLS_MARKER: &str = "[xls]";

fn item_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("ul.icon_list > li").expect("valid selector"))
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\((.*?) .*\)").expect("valid regex"))
}

/// Fetch the index page HTML
pub async fn fetch_index(client: &Client, config: &FetcherConfig) -> Result<String, FetchError> {
    info!("Downloading files from start page {}", config.index_url);

    let response = client.get(&config.index_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            url: config.index_url.clone(),
        });
    }

    Ok(response.text().await?)
}

/// Fetch and parse the index page, returning every resource it lists
///
/// Fails on the first malformed list item and when two items map to the
/// same id.
pub async fn list_resources(
    client: &Client,
    config: &FetcherConfig,
    target_root: &Path,
) -> Result<Vec<Resource>, FetchError> {
    let html = fetch_index(client, config).await?;
    let resources = collect_resources(parse_index(&html, config, target_root)?)?;
    info!("Found {} resources on the index page", resources.len());
    Ok(resources)
}

/// Drain a resource iterator, enforcing id uniqueness
pub fn collect_resources(
    iter: impl Iterator<Item = Result<Resource, FetchError>>,
) -> Result<Vec<Resource>, FetchError> {
    let mut seen = HashSet::new();
    let mut resources = Vec::new();
    for resource in iter {
        let resource = resource?;
        if !seen.insert(resource.id.clone()) {
            return Err(FetchError::page(format!(
                "duplicate resource id {}",
                resource.id
            )));
        }
        resources.push(resource);
    }
    Ok(resources)
}

/// Parse index page HTML into a lazy sequence of resources
///
/// The DOM is walked once up front to capture each list item's link and date
/// text; turning those into resources happens as the iterator is consumed.
pub fn parse_index(
    html: &str,
    config: &FetcherConfig,
    target_root: &Path,
) -> Result<ResourceIter, FetchError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

    let document = Html::parse_document(html);
    let items: Vec<ListItem> = document
        .select(item_selector())
        .map(ListItem::from_element)
        .collect();
    debug!("Index page has {} list items", items.len());

    Ok(ResourceIter {
        items: items.into_iter(),
        base,
        base_str: config.base_url.clone(),
        data_prefix: config.data_path_prefix.clone(),
        target_root: target_root.to_path_buf(),
    })
}

/// Text captured from one `<li>` of the icon list
#[derive(Debug, Clone)]
struct ListItem {
    link_text: Option<String>,
    href: Option<String>,
    span_text: Option<String>,
}

impl ListItem {
    fn from_element(item: ElementRef<'_>) -> Self {
        let link = child_element(item, "a");
        let link_text = link
            .map(|a| a.text().collect::<String>())
            .filter(|text| !text.trim().is_empty());
        let href = link.and_then(|a| a.value().attr("href")).map(str::to_string);
        // The date span sits beside the link, not inside it
        let span_text = child_element(item, "span").map(|span| span.text().collect::<String>());

        Self {
            link_text,
            href,
            span_text,
        }
    }
}

/// First direct child element of `parent` with the given tag name
fn child_element<'a>(parent: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == name)
}

/// Lazy iterator over the resources of one parsed index page
#[derive(Debug)]
pub struct ResourceIter {
    items: std::vec::IntoIter<ListItem>,
    base: Url,
    base_str: String,
    data_prefix: String,
    target_root: PathBuf,
}

impl ResourceIter {
    fn build(&self, item: ListItem, link_text: &str) -> Result<Resource, FetchError> {
        let span_text = item.span_text.as_deref().ok_or_else(|| {
            FetchError::page(format!("no date span next to link {:?}", link_text))
        })?;
        let update_date = extract_update_date(span_text)?;

        let href = item
            .href
            .as_deref()
            .ok_or_else(|| FetchError::page(format!("link {:?} has no href", link_text)))?;
        let (group, file_name) = split_href(href, &self.base_str, &self.data_prefix)?;

        let source_url = self
            .base
            .join(href)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", href, e)))?;

        let stem = file_name.split('.').next().unwrap_or(file_name);

        Ok(Resource {
            id: format!("{}_{}", update_date, stem),
            group: group.to_string(),
            target_dir: self.target_root.join(group),
            source_url: source_url.to_string(),
            file_name: format!("{}_{}", update_date, file_name),
        })
    }
}

impl Iterator for ResourceIter {
    type Item = Result<Resource, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.items.next()?;

            let Some(link_text) = item.link_text.clone() else {
                return Some(Err(FetchError::page("list item without link text")));
            };
            if !link_text.contains(XLS_MARKER) {
                debug!("Ignoring non-spreadsheet link {:?}", link_text.trim());
                continue;
            }

            return Some(self.build(item, &link_text));
        }
    }
}

/// Pull the update date out of text like `(2020/05/01 updated)` as `2020-05-01`
pub fn extract_update_date(text: &str) -> Result<String, FetchError> {
    date_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|date| date.as_str().replace('/', "-"))
        .ok_or_else(|| FetchError::page(format!("no update date in {:?}", text.trim())))
}

/// Split `/english/statis/data/<group>/<file>` into `(group, file)`
pub fn split_href<'a>(
    href: &'a str,
    base_url: &str,
    data_prefix: &str,
) -> Result<(&'a str, &'a str), FetchError> {
    let path = href.strip_prefix(base_url).unwrap_or(href);
    let rest = path
        .strip_prefix(data_prefix)
        .ok_or_else(|| FetchError::page(format!("href {:?} is outside {}", href, data_prefix)))?;

    match rest.split('/').collect::<Vec<_>>().as_slice() {
        [group, file] if !group.is_empty() && !file.is_empty() => Ok((*group, *file)),
        _ => Err(FetchError::page(format!(
            "href {:?} is not <group>/<file>",
            href
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(items: &str) -> String {
        format!(
            r#"<html><body>
            <ul class="nav"><li><a href="/english/">[xls] Not a dataset</a></li></ul>
            <ul class="icon_list">{}</ul>
            </body></html>"#,
            items
        )
    }

    fn parse(html: &str) -> Result<Vec<Resource>, FetchError> {
        let config = FetcherConfig::default();
        collect_resources(parse_index(html, &config, Path::new("/data"))?)
    }

    #[test]
    fn test_builds_resource_from_xls_item() {
        let html = page(
            r#"<li><a href="/english/statis/data/03/report_2020.xlsx">[xls] Some Report</a>
               <span>(2020/05/01 updated)</span></li>"#,
        );
        let resources = parse(&html).unwrap();

        assert_eq!(resources.len(), 1);
        let resource = &resources[0];
        assert_eq!(resource.id, "2020-05-01_report_2020");
        assert_eq!(resource.group, "03");
        assert_eq!(resource.target_dir, PathBuf::from("/data/03"));
        assert_eq!(
            resource.source_url,
            "https://www.paj.gr.jp/english/statis/data/03/report_2020.xlsx"
        );
        assert_eq!(resource.file_name, "2020-05-01_report_2020.xlsx");
    }

    #[test]
    fn test_date_span_is_sibling_of_link() {
        let html = page(
            r#"<li><a href="/english/statis/data/05/prices.xls"><span class="ico">[xls]</span> Prices</a>
               <span>(2022/11/30 updated)</span></li>"#,
        );
        let resources = parse(&html).unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "2022-11-30_prices");
        assert_eq!(resources[0].file_name, "2022-11-30_prices.xls");
    }

    #[test]
    fn test_skips_items_without_xls_marker() {
        let html = page(
            r#"<li><a href="/english/statis/data/01/summary.pdf">[pdf] Summary</a>
               <span>(2020/05/01 updated)</span></li>
               <li><a href="/english/statis/data/02/sales.xls">[xls] Sales</a>
               <span>(2021/01/15 updated)</span></li>"#,
        );
        let resources = parse(&html).unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "2021-01-15_sales");
    }

    #[test]
    fn test_ignores_lists_outside_icon_list() {
        let html = page("");
        assert!(parse(&html).unwrap().is_empty());
    }

    #[test]
    fn test_missing_link_text_is_fatal() {
        let html = page(r#"<li><span>(2020/05/01 updated)</span></li>"#);
        let err = parse(&html).unwrap_err();
        assert!(err.is_page_structure());
    }

    #[test]
    fn test_missing_date_is_fatal() {
        let html = page(
            r#"<li><a href="/english/statis/data/03/report.xlsx">[xls] Report</a>
               <span>updated recently</span></li>"#,
        );
        assert!(parse(&html).unwrap_err().is_page_structure());

        let html = page(r#"<li><a href="/english/statis/data/03/report.xlsx">[xls] Report</a></li>"#);
        assert!(parse(&html).unwrap_err().is_page_structure());
    }

    #[test]
    fn test_malformed_href_is_fatal() {
        let html = page(
            r#"<li><a href="/english/statis/data/03/extra/report.xlsx">[xls] Report</a>
               <span>(2020/05/01 updated)</span></li>"#,
        );
        assert!(parse(&html).unwrap_err().is_page_structure());

        let html = page(
            r#"<li><a href="/somewhere/else.xlsx">[xls] Report</a>
               <span>(2020/05/01 updated)</span></li>"#,
        );
        assert!(parse(&html).unwrap_err().is_page_structure());
    }

    #[test]
    fn test_duplicate_ids_are_fatal() {
        let item = r#"<li><a href="/english/statis/data/03/report.xlsx">[xls] Report</a>
                      <span>(2020/05/01 updated)</span></li>"#;
        let html = page(&format!("{}{}", item, item));
        let err = parse(&html).unwrap_err();
        assert!(err.to_string().contains("duplicate resource id"));
    }

    #[test]
    fn test_parsing_is_repeatable() {
        let html = page(
            r#"<li><a href="/english/statis/data/03/a.xlsx">[xls] A</a><span>(2020/05/01 updated)</span></li>
               <li><a href="/english/statis/data/04/b.xls">[xls] B</a><span>(2020/06/01 updated)</span></li>"#,
        );
        let first: Vec<_> = parse(&html).unwrap().into_iter().map(|r| r.id).collect();
        let second: Vec<_> = parse(&html).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["2020-05-01_a", "2020-06-01_b"]);
    }

    #[test]
    fn test_iterator_is_lazy() {
        // The malformed second item is only reported once the iterator reaches it
        let html = page(
            r#"<li><a href="/english/statis/data/03/a.xlsx">[xls] A</a><span>(2020/05/01 updated)</span></li>
               <li><a href="/english/statis/data/03/b.xlsx">[xls] B</a><span>no date</span></li>"#,
        );
        let config = FetcherConfig::default();
        let mut iter = parse_index(&html, &config, Path::new("/data")).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
    }

    #[test]
    fn test_extract_update_date() {
        assert_eq!(
            extract_update_date("(2020/05/01 updated)").unwrap(),
            "2020-05-01"
        );
        assert!(extract_update_date("(2020/05/01)").is_err());
    }

    #[test]
    fn test_split_href_accepts_absolute_urls() {
        let (group, file) = split_href(
            "https://www.paj.gr.jp/english/statis/data/07/oil.xls",
            "https://www.paj.gr.jp",
            "/english/statis/data/",
        )
        .unwrap();
        assert_eq!((group, file), ("07", "oil.xls"));
    }
}
