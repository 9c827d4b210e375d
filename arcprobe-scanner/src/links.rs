use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static SERVICE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(map|feature|image|mobile)server(/\d*/?)?$").expect("valid service pattern")
});

static LAYER_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(imageserver|\d+)/?$").expect("valid layer pattern"));

static FIND_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/find/?$").expect("valid find pattern"));

static SINGLE_LAYER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)server/\d+/?$").expect("valid single layer pattern"));

static LAYER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d*/?$").expect("valid layer suffix pattern"));

const BREADCRUMBS_CLASS: &str = "breadcrumbs";

/// A candidate anchor on the scanned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLink {
    /// Position of the anchor among all anchors of the document.
    pub index: usize,
    pub url: String,
}

/// Collect anchors pointing at map, feature, image or mobile services.
///
/// Anchors sitting directly inside the breadcrumb trail are skipped. The
/// result keeps document order and `index` counts every `a` element, matched
/// or not, so it identifies the anchor on the page.
pub fn scan_service_links(html: &str, page_url: &str) -> Vec<ServiceLink> {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a").unwrap();
    let base = Url::parse(page_url).ok();

    document
        .select(&anchor_selector)
        .enumerate()
        .filter(|(_, anchor)| !in_breadcrumbs(anchor))
        .filter_map(|(index, anchor)| {
            let href = anchor.value().attr("href")?;
            let url = resolve_href(base.as_ref(), href)?;
            if is_service_url(&url) {
                debug!("Service link #{}: {}", index, url);
                Some(ServiceLink { index, url })
            } else {
                None
            }
        })
        .collect()
}

/// True when the URL names a map/feature/image/mobile service or one of its layers.
pub fn is_service_url(url: &str) -> bool {
    SERVICE_LINK.is_match(url)
}

/// True for pages describing a single layer, table or an image service.
pub fn is_layer_page(url: &str) -> bool {
    LAYER_PAGE.is_match(strip_query(url))
}

/// True for the `find` operation page of a map service.
pub fn is_find_page(url: &str) -> bool {
    FIND_PAGE.is_match(strip_query(url))
}

/// True when the URL points at one layer (`.../MapServer/3`).
pub fn is_single_layer(url: &str) -> bool {
    SINGLE_LAYER.is_match(strip_query(url))
}

pub fn is_feature_server(url: &str) -> bool {
    url.to_lowercase().contains("/featureserver/")
}

/// Remove a trailing layer id, giving the service root.
pub fn service_root(url: &str) -> String {
    LAYER_SUFFIX.replace(strip_query(url), "").into_owned()
}

/// Remove the `/find` suffix of a find operation page.
pub fn strip_find(url: &str) -> String {
    FIND_PAGE.replace(strip_query(url), "").into_owned()
}

/// Drop query string and fragment.
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Labels of the field list printed on a layer page.
///
/// The services directory prints fields as a `<ul>` right after a
/// `<b>Fields:</b>` label. The last such list wins.
pub fn field_list_labels(html: &str) -> Option<Vec<String>> {
    let document = Html::parse_document(html);
    let list_selector = Selector::parse("ul").unwrap();

    document
        .select(&list_selector)
        .filter(|list| {
            previous_label(list)
                .map(|label| label.starts_with("Fields:"))
                .unwrap_or(false)
        })
        .last()
        .map(|list| {
            list.children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "li")
                .map(|item| collapse_whitespace(&item.text().collect::<String>()))
                .collect()
        })
}

fn in_breadcrumbs(anchor: &ElementRef) -> bool {
    anchor
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| parent.value().classes().any(|class| class == BREADCRUMBS_CLASS))
        .unwrap_or(false)
}

fn previous_label(list: &ElementRef) -> Option<String> {
    list.prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "b")
        .map(|label| label.text().collect::<String>().trim().to_string())
}

fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://gis.example.com/arcgis/rest/services";

    #[test]
    fn test_scan_finds_service_links_in_document_order() {
        let html = r#"<html><body>
            <div class="breadcrumbs"><a href="/arcgis/rest/services/Parcels/MapServer">Parcels</a></div>
            <ul>
              <li><a href="/arcgis/rest/services/Parcels/MapServer">Parcels</a> (MapServer)</li>
              <li><a href="/arcgis/rest/services/Roads/FeatureServer/2">Roads</a></li>
              <li><a href="/arcgis/rest/services/Geocode/GeocodeServer">Geocode</a></li>
              <li><a href="https://other.example.com/arcgis/rest/services/Ortho/ImageServer/">Ortho</a></li>
            </ul>
        </body></html>"#;

        let links = scan_service_links(html, PAGE);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].index, 1);
        assert_eq!(
            links[0].url,
            "https://gis.example.com/arcgis/rest/services/Parcels/MapServer"
        );
        assert_eq!(links[1].index, 2);
        assert!(links[1].url.ends_with("/Roads/FeatureServer/2"));
        assert_eq!(links[2].index, 4);
        assert!(links[2].url.ends_with("/Ortho/ImageServer/"));
    }

    #[test]
    fn test_scan_never_returns_breadcrumb_anchors() {
        let html = r#"<div class="breadcrumbs">
            <a href="/rest/services/A/MapServer">A</a>
            <a href="/rest/services/B/MapServer/0">B</a>
        </div>
        <p><a href="/rest/services/C/MapServer">C</a></p>"#;

        let links = scan_service_links(html, PAGE);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].index, 2);
        assert!(links[0].url.ends_with("/C/MapServer"));
    }

    #[test]
    fn test_scan_is_case_insensitive() {
        let html = r#"<a href="/rest/services/A/mapserver">a</a><a href="/rest/services/B/MOBILESERVER/">b</a>"#;
        let links = scan_service_links(html, PAGE);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_scan_skips_operation_and_query_links() {
        let html = r#"
            <a href="/rest/services/A/MapServer/export">export</a>
            <a href="/rest/services/A/MapServer?f=json">json</a>
            <a href="/rest/services/A/MapServer/0/query">query</a>
            <a href="javascript:void(0)">js</a>
            <a>no href</a>"#;
        assert!(scan_service_links(html, PAGE).is_empty());
    }

    #[test]
    fn test_is_service_url() {
        assert!(is_service_url("https://h/rest/services/X/MapServer"));
        assert!(is_service_url("https://h/rest/services/X/FeatureServer/12"));
        assert!(is_service_url("https://h/rest/services/X/ImageServer/"));
        assert!(!is_service_url("https://h/rest/services/X/GPServer"));
        assert!(!is_service_url("https://h/rest/services/X/MapServer/layers"));
    }

    #[test]
    fn test_page_kind_detection() {
        assert!(is_layer_page("https://h/rest/services/X/MapServer/3"));
        assert!(is_layer_page("https://h/rest/services/X/ImageServer?f=html"));
        assert!(!is_layer_page("https://h/rest/services/X/MapServer"));
        assert!(is_find_page("https://h/rest/services/X/MapServer/find"));
        assert!(is_single_layer("https://h/rest/services/X/MapServer/0/"));
        assert!(!is_single_layer("https://h/rest/services/X/MapServer"));
        assert!(is_feature_server("https://h/rest/services/X/FeatureServer/0"));
    }

    #[test]
    fn test_service_root_and_find_stripping() {
        assert_eq!(
            service_root("https://h/rest/services/X/MapServer/3"),
            "https://h/rest/services/X/MapServer"
        );
        assert_eq!(
            strip_find("https://h/rest/services/X/MapServer/find?searchText=a"),
            "https://h/rest/services/X/MapServer"
        );
    }

    #[test]
    fn test_field_list_labels_uses_last_fields_list() {
        let html = r#"<body>
            <b>Layers:</b><ul><li>not a field</li></ul>
            <b>Fields:</b>
            <ul>
              <li>OBJECTID <i>(type: esriFieldTypeOID, alias: OBJECTID)</i></li>
              <li>NAME <i>(type: esriFieldTypeString, alias: Name)</i></li>
            </ul>
        </body>"#;

        let labels = field_list_labels(html).unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0], "OBJECTID (type: esriFieldTypeOID, alias: OBJECTID)");
        assert!(labels[1].starts_with("NAME"));
    }

    #[test]
    fn test_field_list_labels_missing() {
        assert!(field_list_labels("<b>Layers:</b><ul><li>x</li></ul>").is_none());
    }
}
