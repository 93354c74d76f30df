//! Request Classifier
//!
//! Assigns every intercepted request to exactly one category. Rules are
//! evaluated in priority order: navigation, api, static, image, other.
//! API is checked before static and image, so an API route serving a
//! `.png` filename is still an API request.

use crate::config::RouteConfig;
use crate::core::http::{Request, RequestMode};
use regex::RegexSet;
use reqwest::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    Navigation,
    Api,
    Static,
    Image,
    Other,
}

pub struct RequestClassifier {
    api: RegexSet,
    static_assets: RegexSet,
    images: RegexSet,
    message_send: RegexSet,
    realtime: RegexSet,
    font_domains: Vec<String>,
    image_domains: Vec<String>,
}

impl RequestClassifier {
    pub fn new(routes: &RouteConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            api: RegexSet::new(&routes.api_patterns)?,
            static_assets: RegexSet::new(&routes.static_patterns)?,
            images: RegexSet::new(&routes.image_patterns)?,
            message_send: RegexSet::new(&routes.message_send_patterns)?,
            realtime: RegexSet::new(&routes.realtime_patterns)?,
            font_domains: routes.font_domains.clone(),
            image_domains: routes.image_domains.clone(),
        })
    }

    pub fn classify(&self, request: &Request) -> RequestCategory {
        if self.is_navigation(request) {
            return RequestCategory::Navigation;
        }

        let url = request.url.as_str();
        if self.api.is_match(url) {
            RequestCategory::Api
        } else if self.static_assets.is_match(url) || host_in(&request.url, &self.font_domains) {
            RequestCategory::Static
        } else if self.images.is_match(url) || host_in(&request.url, &self.image_domains) {
            RequestCategory::Image
        } else {
            RequestCategory::Other
        }
    }

    pub fn is_navigation(&self, request: &Request) -> bool {
        if request.mode == RequestMode::Navigate {
            return true;
        }
        request.is_get()
            && request
                .header("accept")
                .map(|accept| accept.contains("text/html"))
                .unwrap_or(false)
    }

    pub fn is_api(&self, url: &Url) -> bool {
        self.api.is_match(url.as_str())
    }

    /// POSTs to a message-send endpoint are routed to the outbox.
    pub fn is_message_send(&self, request: &Request) -> bool {
        request.method == "POST"
            && self.is_api(&request.url)
            && self.message_send.is_match(request.url.as_str())
    }

    /// Whether the worker handles this request at all. Everything else is
    /// passed through to the network untouched.
    pub fn should_intercept(&self, request: &Request) -> bool {
        let scheme = request.url.scheme();
        if scheme != "http" && scheme != "https" {
            return false;
        }
        if self.realtime.is_match(request.url.as_str()) {
            return false;
        }
        request.is_get() || self.is_message_send(request)
    }
}

fn host_in(url: &Url, domains: &[String]) -> bool {
    match url.host_str() {
        Some(host) => domains
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{}", domain))),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::new(&RouteConfig::default()).unwrap()
    }

    fn get(url: &str) -> Request {
        Request::get(url.parse().unwrap())
    }

    #[test]
    fn test_navigation_by_mode_and_accept() {
        let c = classifier();
        assert_eq!(
            c.classify(&Request::navigate("https://shop.test/listings".parse().unwrap())),
            RequestCategory::Navigation
        );
        let by_accept = get("https://shop.test/profile").with_header("accept", "text/html");
        assert_eq!(c.classify(&by_accept), RequestCategory::Navigation);
    }

    #[test]
    fn test_html_accept_on_post_is_not_navigation() {
        let c = classifier();
        let post = Request::post("https://shop.test/form".parse().unwrap(), "x")
            .with_header("accept", "text/html");
        assert_eq!(c.classify(&post), RequestCategory::Other);
    }

    #[test]
    fn test_api_static_image_other() {
        let c = classifier();
        assert_eq!(
            c.classify(&get("https://abc.supabase.co/rest/v1/listings?select=*")),
            RequestCategory::Api
        );
        assert_eq!(c.classify(&get("https://shop.test/assets/app.js")), RequestCategory::Static);
        assert_eq!(
            c.classify(&get("https://fonts.gstatic.com/s/inter/v12/abc")),
            RequestCategory::Static
        );
        assert_eq!(c.classify(&get("https://shop.test/img/logo.webp")), RequestCategory::Image);
        assert_eq!(
            c.classify(&get("https://images.unsplash.com/photo-123")),
            RequestCategory::Image
        );
        assert_eq!(c.classify(&get("https://shop.test/robots.txt")), RequestCategory::Other);
    }

    #[test]
    fn test_api_wins_over_image_extension() {
        let c = classifier();
        let request = get("https://shop.test/functions/v1/thumbnail/photo.png");
        assert_eq!(c.classify(&request), RequestCategory::Api);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let request = get("https://shop.test/img/a.jpg");
        let first = c.classify(&request);
        for _ in 0..10 {
            assert_eq!(c.classify(&request), first);
        }
    }

    #[test]
    fn test_interception_rules() {
        let c = classifier();
        assert!(c.should_intercept(&get("https://shop.test/")));
        assert!(!c.should_intercept(&get("https://abc.supabase.co/realtime/v1/websocket")));
        assert!(!c.should_intercept(&get("wss://abc.supabase.co/socket")));

        let send = Request::post("https://abc.supabase.co/rest/v1/messages".parse().unwrap(), "{}");
        assert!(c.is_message_send(&send));
        assert!(c.should_intercept(&send));

        let other_post = Request::post("https://abc.supabase.co/rest/v1/offers".parse().unwrap(), "{}");
        assert!(!c.should_intercept(&other_post));
    }
}
