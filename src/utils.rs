//! DVB locator and URL utilities shared by the AIT pipeline and the
//! application manager.

use derive_more::Display;
use url::Url;

/// Marker for an unknown network/stream/service ID.
pub const INVALID_ID: u16 = 0xFFFF;

/// `(original_network_id, transport_stream_id, service_id)` triplet
/// uniquely identifying a DVB service.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display(
    fmt = "{:x}.{:x}.{:x}",
    original_network_id,
    transport_stream_id,
    service_id
)]
pub struct DvbTriplet {
    pub original_network_id: u16,
    pub transport_stream_id: u16,
    pub service_id: u16,
}

impl DvbTriplet {
    /// Triplet representing "no service selected".
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            original_network_id: INVALID_ID,
            transport_stream_id: INVALID_ID,
            service_id: INVALID_ID,
        }
    }

    /// Whether any component of this triplet is unknown.
    #[must_use]
    pub fn is_invalid(self) -> bool {
        self.original_network_id == INVALID_ID
            || self.transport_stream_id == INVALID_ID
            || self.service_id == INVALID_ID
    }
}

impl Default for DvbTriplet {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Classification of a URL passed to `createApplication`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CreateLocator {
    /// DVB application locator (TS 102 851) referring to an application
    /// signalled in the current service AIT.
    AitApplication {
        org_id: u32,
        app_id: u16,
        /// Query string or fragment remainder, including its leading
        /// `?`/`#`. Empty if the locator had none.
        params: String,
    },

    /// HTTP(S) URL: either an entry page or an XML AIT resource.
    EntryOrXmlAit,

    /// Anything else; the application cannot be created from it.
    Unknown,
}

/// Parses a `createApplication` URL against the currently selected service.
///
/// `dvb://current/…` always denotes the current service;
/// `dvb://onid.tsid.sid.ait/…` (hex components, `tsid` may be empty to
/// match any transport stream) only when the triplet matches and a service
/// is selected.
#[must_use]
pub fn parse_create_locator(
    url: &str,
    current_service: DvbTriplet,
) -> CreateLocator {
    if let Some(rest) = url.strip_prefix("dvb://") {
        let (filter, remainder) = match rest.find(".ait/") {
            Some(pos) => (&rest[..pos], &rest[pos + 5..]),
            None => return CreateLocator::Unknown,
        };
        if !ait_filter_is_current_service(filter, current_service) {
            return CreateLocator::Unknown;
        }

        // Split off the query string or fragment remainder.
        let split = remainder
            .find('?')
            .or_else(|| remainder.find('#'))
            .unwrap_or_else(|| remainder.len());
        let (app_part, params) = remainder.split_at(split);

        let mut ids = app_part.splitn(2, '.');
        let org_id = ids.next().and_then(|s| u32::from_str_radix(s, 16).ok());
        let app_id = ids.next().and_then(|s| u16::from_str_radix(s, 16).ok());
        match (org_id, app_id) {
            (Some(org_id), Some(app_id)) => CreateLocator::AitApplication {
                org_id,
                app_id,
                params: params.to_owned(),
            },
            _ => CreateLocator::Unknown,
        }
    } else if url.starts_with("http://") || url.starts_with("https://") {
        CreateLocator::EntryOrXmlAit
    } else {
        CreateLocator::Unknown
    }
}

/// Whether an AIT filter (the part between `dvb://` and `.ait/`) denotes
/// the currently selected service.
fn ait_filter_is_current_service(
    filter: &str,
    current_service: DvbTriplet,
) -> bool {
    if filter == "current" {
        return true;
    }
    if current_service.is_invalid() {
        return false;
    }

    // original_network_id "." [ transport_stream_id ] "." service_id
    let mut parts = filter.splitn(3, '.');
    let onid = parts.next().and_then(|s| u16::from_str_radix(s, 16).ok());
    let tsid = match parts.next() {
        Some("") => None,
        Some(s) => match u16::from_str_radix(s, 16) {
            Ok(id) => Some(id),
            Err(_) => return false,
        },
        None => return false,
    };
    let sid = parts.next().and_then(|s| u16::from_str_radix(s, 16).ok());

    match (onid, sid) {
        (Some(onid), Some(sid)) => {
            onid == current_service.original_network_id
                && tsid.map_or(true, |id| {
                    id == current_service.transport_stream_id
                })
                && sid == current_service.service_id
        }
        _ => false,
    }
}

/// Returns the origin of `url` as defined by [RFC 6454]:
/// `<scheme>://<host>:<port>`, with the port defaulting to 443 for
/// `https` and 80 otherwise.
///
/// [RFC 6454]: https://tools.ietf.org/html/rfc6454
#[must_use]
pub fn url_origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_owned();
    let port = parsed
        .port()
        .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });
    Some(format!("{}://{}:{}", parsed.scheme(), host, port))
}

/// Compares two URLs ignoring trailing whitespace and slashes. Empty
/// strings never compare equal.
#[must_use]
pub fn compare_urls(url1: &str, url2: &str) -> bool {
    let str1 = url1.trim_end_matches(|c: char| c.is_whitespace() || c == '/');
    let str2 = url2.trim_end_matches(|c: char| c.is_whitespace() || c == '/');
    !str1.is_empty() && str1 == str2
}

/// Whether `document_url` is contained in the application base URL.
#[must_use]
pub fn is_part_of(document_url: &str, app_base_url: &str) -> bool {
    let doc =
        document_url.trim_end_matches(|c: char| c.is_whitespace() || c == '/');
    let base =
        app_base_url.trim_end_matches(|c: char| c.is_whitespace() || c == '/');
    !doc.is_empty() && !base.is_empty() && doc.starts_with(base)
}

/// Whether `url` is within the application sandbox: its origin matches the
/// origin of `app_uri` or of any extra boundary.
#[must_use]
pub fn check_boundaries(
    url: &str,
    app_uri: &str,
    app_boundaries: &[String],
) -> bool {
    let origin = match url_origin(url) {
        Some(origin) => origin,
        None => return false,
    };
    let matches = |uri: &str| {
        url_origin(uri).map_or(false, |other| compare_urls(&origin, &other))
    };
    matches(app_uri) || app_boundaries.iter().any(|b| matches(b))
}

/// Joins a base URL, a signalled location and locator parameters into an
/// entry page URL. The location's fragment is stripped; if the location
/// already carries a query string, every `?` in `params` is converted to
/// `&` before appending.
#[must_use]
pub fn merge_url_params(base: &str, location: &str, params: &str) -> String {
    let path = match location.find('#') {
        Some(pos) => &location[..pos],
        None => location,
    };
    let mut result = format!("{}{}", base, path);
    if path.contains('?') {
        result.push_str(&params.replace('?', "&"));
    } else {
        result.push_str(params);
    }
    result
}

#[cfg(test)]
mod spec {
    use super::*;

    fn service() -> DvbTriplet {
        DvbTriplet {
            original_network_id: 1,
            transport_stream_id: 0xFF,
            service_id: 0x100,
        }
    }

    #[test]
    fn locator_for_current_keyword() {
        assert_eq!(
            parse_create_locator("dvb://current.ait/7f.12", service()),
            CreateLocator::AitApplication {
                org_id: 0x7F,
                app_id: 0x12,
                params: String::new(),
            },
        );
    }

    #[test]
    fn locator_with_invalid_current_service_is_unknown() {
        assert_eq!(
            parse_create_locator("dvb://1.2.3.ait/1.2", DvbTriplet::invalid()),
            CreateLocator::Unknown,
        );
        // "current" does not need a valid service to be recognised, but a
        // locator without the ".ait/" separator is not an app locator.
        assert_eq!(
            parse_create_locator("dvb://current/1.2", DvbTriplet::invalid()),
            CreateLocator::Unknown,
        );
    }

    #[test]
    fn locator_with_matching_triplet_and_params() {
        assert_eq!(
            parse_create_locator("dvb://1.ff.100.ait/7f.12?a=1", service()),
            CreateLocator::AitApplication {
                org_id: 0x7F,
                app_id: 0x12,
                params: "?a=1".into(),
            },
        );
    }

    #[test]
    fn locator_with_empty_tsid_matches_any_transport_stream() {
        assert_eq!(
            parse_create_locator("dvb://1..100.ait/7f.12#frag", service()),
            CreateLocator::AitApplication {
                org_id: 0x7F,
                app_id: 0x12,
                params: "#frag".into(),
            },
        );
    }

    #[test]
    fn locator_for_other_service_is_unknown() {
        assert_eq!(
            parse_create_locator("dvb://2.ff.100.ait/7f.12", service()),
            CreateLocator::Unknown,
        );
    }

    #[test]
    fn locator_schemes() {
        assert_eq!(
            parse_create_locator("https://a.tv/app.html", service()),
            CreateLocator::EntryOrXmlAit,
        );
        assert_eq!(
            parse_create_locator("ftp://a.tv/app.html", service()),
            CreateLocator::Unknown,
        );
    }

    #[test]
    fn origin_defaults_ports() {
        assert_eq!(
            url_origin("http://a.tv/x/y?z").as_deref(),
            Some("http://a.tv:80"),
        );
        assert_eq!(
            url_origin("https://a.tv/x").as_deref(),
            Some("https://a.tv:443"),
        );
        assert_eq!(
            url_origin("https://a.tv:8443/x").as_deref(),
            Some("https://a.tv:8443"),
        );
        assert_eq!(url_origin("not a url"), None);
    }

    #[test]
    fn url_comparison_ignores_trailing_slash_and_whitespace() {
        assert!(compare_urls("http://a.tv/x/", "http://a.tv/x"));
        assert!(compare_urls("http://a.tv/x \n", "http://a.tv/x"));
        assert!(!compare_urls("http://a.tv/x", "http://a.tv/y"));
        assert!(!compare_urls("", ""));
    }

    #[test]
    fn boundary_checks_match_origins() {
        let boundaries = vec!["https://cdn.a.tv/static/".to_owned()];
        assert!(check_boundaries(
            "http://a.tv/page.html",
            "http://a.tv/app/index.html",
            &boundaries,
        ));
        assert!(check_boundaries(
            "https://cdn.a.tv/asset.js",
            "http://a.tv/app/index.html",
            &boundaries,
        ));
        assert!(!check_boundaries(
            "http://evil.tv/page.html",
            "http://a.tv/app/index.html",
            &boundaries,
        ));
    }

    #[test]
    fn url_params_merge() {
        assert_eq!(
            merge_url_params("http://x/", "a.html#top", "?lang=en"),
            "http://x/a.html?lang=en",
        );
        assert_eq!(
            merge_url_params("http://x/", "a.html?b=1", "?lang=en"),
            "http://x/a.html?b=1&lang=en",
        );
    }
}
