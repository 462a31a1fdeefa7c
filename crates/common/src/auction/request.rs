//! Outbound bid request shape and the page context it is built from.

use cookie::Cookie;
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};

use crate::error::HtbError;

use super::types::SlotRequest;
use super::zone::ZoneId;

/// Browser-side facts the wrapper supplies for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// Page protocol including the trailing colon (e.g., "https:").
    pub protocol: String,
    pub hostname: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Raw `Cookie` header of the top window, if readable.
    #[serde(default)]
    pub cookie_header: Option<String>,
}

impl PageContext {
    /// Protocol without the trailing colon.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.protocol.trim_end_matches(':')
    }

    /// Prefix a protocol-relative url (`//host/path`) with the page protocol.
    #[must_use]
    pub fn absolute_url(&self, protocol_relative: &str) -> String {
        format!("{}{}", self.protocol, protocol_relative)
    }

    /// First value of the named cookie in the page's cookie header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.cookie_header.as_deref()?;
        Cookie::split_parse(header.trim())
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_string())
    }
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            protocol: "https:".to_string(),
            hostname: "localhost".to_string(),
            screen_width: 0,
            screen_height: 0,
            viewport_width: 0,
            viewport_height: 0,
            cookie_header: None,
        }
    }
}

/// Query data sent to the bid endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub hostname: String,
    /// Protocol without the trailing colon.
    pub protocol: String,
    /// Screen width.
    pub sw: u32,
    /// Screen height.
    pub sh: u32,
    /// Viewport width.
    pub ww: u32,
    /// Viewport height.
    pub wh: u32,
    /// Request timestamp in epoch milliseconds.
    pub i: i64,
    /// Distinct requested zones in first-appearance order.
    pub zones: Vec<ZoneId>,
    /// URI-component-encoded JSON of the compiled zone conditions.
    pub c: String,
}

/// Request handed to the wrapper's transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestObject {
    pub url: String,
    pub data: RequestData,
    /// Correlates the eventual response with this request.
    pub callback_id: String,
}

impl RequestObject {
    /// Render the endpoint url with `data` as its query string.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint url cannot be parsed.
    pub fn full_url(&self) -> Result<String, Report<HtbError>> {
        let mut url = url::Url::parse(&self.url).change_context(HtbError::Request {
            message: format!("Invalid bid endpoint url: {}", self.url),
        })?;

        let zones = self
            .data
            .zones
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        url.query_pairs_mut()
            .append_pair("hostname", &self.data.hostname)
            .append_pair("protocol", &self.data.protocol)
            .append_pair("sw", &self.data.sw.to_string())
            .append_pair("sh", &self.data.sh.to_string())
            .append_pair("ww", &self.data.ww.to_string())
            .append_pair("wh", &self.data.wh.to_string())
            .append_pair("i", &self.data.i.to_string())
            .append_pair("zones", &zones)
            .append_pair("c", &self.data.c);

        Ok(url.to_string())
    }
}

/// Distinct zones of the given slots, in first-appearance order. Slots
/// without a zone are skipped.
#[must_use]
pub fn distinct_zones(slots: &[SlotRequest]) -> Vec<ZoneId> {
    let mut zones: Vec<ZoneId> = Vec::new();
    for zone in slots.iter().filter_map(|slot| slot.constraint.zone_id) {
        if !zones.contains(&zone) {
            zones.push(zone);
        }
    }
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::types::SlotConstraint;

    fn page(cookie_header: Option<&str>) -> PageContext {
        PageContext {
            protocol: "https:".to_string(),
            hostname: "publisher.example".to_string(),
            screen_width: 1920,
            screen_height: 1080,
            viewport_width: 1280,
            viewport_height: 720,
            cookie_header: cookie_header.map(ToString::to_string),
        }
    }

    #[test]
    fn test_scheme_and_absolute_url() {
        let page = page(None);
        assert_eq!(page.scheme(), "https");
        assert_eq!(
            page.absolute_url("//cdn.example/x.js"),
            "https://cdn.example/x.js"
        );
    }

    #[test]
    fn test_cookie_lookup() {
        let page = page(Some("a=1; jpxhbjs=v2/; b=3"));
        assert_eq!(page.cookie("jpxhbjs").as_deref(), Some("v2/"));
        assert_eq!(page.cookie("missing"), None);
    }

    #[test]
    fn test_cookie_lookup_without_header() {
        assert_eq!(page(None).cookie("jpxhbjs"), None);
        assert_eq!(page(Some("")).cookie("jpxhbjs"), None);
    }

    #[test]
    fn test_distinct_zones_keeps_first_appearance() {
        let slots = vec![
            SlotRequest::new("a", "1", "_1", SlotConstraint::new(20)),
            SlotRequest::new("b", "2", "_2", SlotConstraint::new(1163)),
            SlotRequest::new("c", "3", "_3", SlotConstraint::new(20)),
            SlotRequest::new(
                "d",
                "4",
                "_4",
                SlotConstraint {
                    zone_id: None,
                    allow: Vec::new(),
                    exclude: Vec::new(),
                },
            ),
        ];
        assert_eq!(
            distinct_zones(&slots),
            vec![ZoneId::new(20), ZoneId::new(1163)]
        );
    }

    #[test]
    fn test_full_url_encodes_query() {
        let request = RequestObject {
            url: "https://pre.ads.justpremium.com/v/2.0/t/ixhr".to_string(),
            data: RequestData {
                hostname: "publisher.example".to_string(),
                protocol: "https".to_string(),
                sw: 1920,
                sh: 1080,
                ww: 1280,
                wh: 720,
                i: 1_700_000_000_000,
                zones: vec![ZoneId::new(20), ZoneId::new(1163)],
                c: "%7B%2220%22%3A1%7D".to_string(),
            },
            callback_id: "cb".to_string(),
        };

        let url = request.full_url().expect("should build url");
        assert!(url.starts_with("https://pre.ads.justpremium.com/v/2.0/t/ixhr?"));
        assert!(url.contains("hostname=publisher.example"));
        assert!(url.contains("zones=20%2C1163"));
        assert!(url.contains("i=1700000000000"));
        assert!(url.contains("c=%257B%2522"));
    }

    #[test]
    fn test_full_url_rejects_relative_endpoint() {
        let request = RequestObject {
            url: "//pre.ads.justpremium.com".to_string(),
            data: RequestData {
                hostname: String::new(),
                protocol: String::new(),
                sw: 0,
                sh: 0,
                ww: 0,
                wh: 0,
                i: 0,
                zones: vec![],
                c: String::new(),
            },
            callback_id: "cb".to_string(),
        };
        assert!(request.full_url().is_err());
    }
}
