//! Embed URL rewriting.

use std::collections::BTreeMap;

/// Query parameter that enables programmatic control of the embed.
pub const JS_API_PARAM: &str = "enablejsapi";

/// Whether `src` points at one of the configured embed hosts.
pub fn is_embed_url(src: &str, hosts: &[String]) -> bool {
    hosts.iter().any(|h| !h.is_empty() && src.contains(h.as_str()))
}

/// The origin to announce to the embed, or `None` for pages opened from
/// disk, where the player rejects any origin we could send.
pub fn embed_origin(protocol: &str, origin: &str) -> Option<String> {
    if protocol.eq_ignore_ascii_case("file:") {
        tracing::warn!("Page opened from file:, embeds will not report an origin");
        return None;
    }
    if origin.is_empty() || origin == "null" {
        return None;
    }
    Some(origin.to_string())
}

/// Add the control flag, the origin and the presentation parameters to an
/// embed URL. Parameters already present are left untouched, and a
/// `#fragment` stays at the end.
pub fn rewrite_embed_url(
    src: &str,
    origin: Option<&str>,
    params: &BTreeMap<String, String>,
) -> String {
    let (rest, fragment) = match src.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (src, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };

    let present: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').map_or(pair, |(name, _)| name))
        .collect();

    let mut added: Vec<String> = Vec::new();
    let mut add = |name: &str, value: &str| {
        if !present.contains(&name) && !added.iter().any(|a| a.split('=').next() == Some(name)) {
            added.push(format!("{}={}", name, urlencoding::encode(value)));
        }
    };
    add(JS_API_PARAM, "1");
    if let Some(origin) = origin {
        add("origin", origin);
    }
    for (name, value) in params {
        add(name, value);
    }

    let mut url = String::with_capacity(src.len() + 64);
    url.push_str(path);
    let trimmed = query.trim_end_matches('&');
    if !trimmed.is_empty() || !added.is_empty() {
        url.push('?');
        url.push_str(trimmed);
        if !trimmed.is_empty() && !added.is_empty() {
            url.push('&');
        }
        url.push_str(&added.join("&"));
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("playsinline".to_string(), "1".to_string()),
            ("rel".to_string(), "0".to_string()),
        ])
    }

    #[test]
    fn adds_parameters_to_bare_url() {
        let url = rewrite_embed_url(
            "https://www.youtube.com/embed/abc",
            Some("https://example.com"),
            &params(),
        );
        assert_eq!(
            url,
            "https://www.youtube.com/embed/abc?enablejsapi=1&origin=https%3A%2F%2Fexample.com&playsinline=1&rel=0"
        );
    }

    #[test]
    fn keeps_existing_parameters() {
        let url = rewrite_embed_url(
            "https://www.youtube.com/embed/abc?rel=1&enablejsapi=1",
            None,
            &params(),
        );
        assert_eq!(url, "https://www.youtube.com/embed/abc?rel=1&enablejsapi=1&playsinline=1");
    }

    #[test]
    fn fragment_stays_last() {
        let url = rewrite_embed_url("https://www.youtube.com/embed/abc#t=30", None, &BTreeMap::new());
        assert_eq!(url, "https://www.youtube.com/embed/abc?enablejsapi=1#t=30");
    }

    #[test]
    fn trailing_question_mark() {
        let url = rewrite_embed_url("https://www.youtube.com/embed/abc?", None, &BTreeMap::new());
        assert_eq!(url, "https://www.youtube.com/embed/abc?enablejsapi=1");
    }

    #[test]
    fn file_pages_send_no_origin() {
        assert_eq!(embed_origin("file:", "null"), None);
        assert_eq!(
            embed_origin("https:", "https://example.com").as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn host_matching() {
        let hosts = vec!["youtube.com/embed".to_string()];
        assert!(is_embed_url("https://www.youtube.com/embed/x", &hosts));
        assert!(!is_embed_url("https://player.vimeo.com/video/1", &hosts));
        assert!(!is_embed_url("anything", &[String::new()]));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn embed_src() -> impl Strategy<Value = String> {
        (
            "[a-zA-Z0-9_-]{1,11}",
            prop::collection::vec(("[a-z]{1,8}", "[a-z0-9]{0,4}"), 0..4),
            prop::option::of("[a-z0-9=]{1,6}"),
        )
            .prop_map(|(id, query, fragment)| {
                let mut src = format!("https://www.youtube.com/embed/{id}");
                if !query.is_empty() {
                    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    src.push('?');
                    src.push_str(&pairs.join("&"));
                }
                if let Some(fragment) = fragment {
                    src.push('#');
                    src.push_str(&fragment);
                }
                src
            })
    }

    fn count_param(url: &str, name: &str) -> usize {
        let query = url.split('#').next().unwrap_or("");
        let query = query.split_once('?').map_or("", |(_, q)| q);
        query
            .split('&')
            .filter(|pair| pair.split('=').next() == Some(name))
            .count()
    }

    proptest! {
        /// Rewriting twice changes nothing the second time.
        #[test]
        fn rewrite_is_idempotent(src in embed_src()) {
            let params = BTreeMap::from([("playsinline".to_string(), "1".to_string())]);
            let once = rewrite_embed_url(&src, Some("https://example.com"), &params);
            let twice = rewrite_embed_url(&once, Some("https://example.com"), &params);
            prop_assert_eq!(&once, &twice);
        }

        /// The control flag is present exactly once unless the source
        /// already carried it.
        #[test]
        fn control_flag_added_once(src in embed_src()) {
            let before = count_param(&src, JS_API_PARAM);
            let url = rewrite_embed_url(&src, None, &BTreeMap::new());
            prop_assert_eq!(count_param(&url, JS_API_PARAM), before.max(1));
        }
    }
}
