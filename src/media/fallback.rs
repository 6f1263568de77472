//! Replacement content for a sentinel video the browser cannot decode.

use serde::Serialize;

use crate::i18n::LanguageManager;

/// A poster image and a link to the file, shown instead of the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFallback {
    pub href: String,
    pub poster: Option<String>,
    pub link_text: String,
}

/// Decide what replaces the video. `None` when the browser can play MP4
/// or there is nothing to link to.
///
/// `source` is the first `<source>` element's `src`, `poster` the
/// element's `data-fallback-poster`.
pub fn video_fallback(
    can_play_mp4: bool,
    source: Option<&str>,
    poster: Option<&str>,
    default_href: Option<&str>,
    language: &LanguageManager,
) -> Option<VideoFallback> {
    if can_play_mp4 {
        return None;
    }
    let href = source
        .filter(|s| !s.trim().is_empty())
        .or(default_href)?
        .to_string();
    tracing::info!("Browser cannot play MP4, offering {}", href);
    Some(VideoFallback {
        href,
        poster: poster.filter(|p| !p.is_empty()).map(str::to_string),
        link_text: language.t_or("video.fallback", &[], "Descargar / reproducir video"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SiteConfig, StorageConfig};
    use crate::i18n::Translations;
    use crate::platform::memory::MemoryStore;
    use crate::prefs::Preferences;

    fn language() -> LanguageManager {
        let prefs = Preferences::new(MemoryStore::new(), StorageConfig::default());
        let lm = LanguageManager::new(Translations::default(), &SiteConfig::default(), prefs);
        lm.init();
        lm
    }

    #[test]
    fn playable_video_needs_no_fallback() {
        let lm = language();
        assert_eq!(video_fallback(true, Some("hero.mp4"), None, None, &lm), None);
    }

    #[test]
    fn source_wins_over_configured_link() {
        let lm = language();
        let fallback =
            video_fallback(false, Some("hero.mp4"), Some("hero.jpg"), Some("other.mp4"), &lm)
                .unwrap();
        assert_eq!(fallback.href, "hero.mp4");
        assert_eq!(fallback.poster.as_deref(), Some("hero.jpg"));
        assert_eq!(fallback.link_text, "Descargar / reproducir video");
    }

    #[test]
    fn configured_link_covers_missing_source() {
        let lm = language();
        let fallback = video_fallback(false, Some(" "), Some(""), Some("other.mp4"), &lm).unwrap();
        assert_eq!(fallback.href, "other.mp4");
        assert_eq!(fallback.poster, None);
        assert_eq!(video_fallback(false, None, None, None, &lm), None);
    }
}
