//! Scenario replay over the in-memory platform.
//!
//! A scenario declares the page's media and embeds and a list of steps.
//! Replaying runs the real runtime against the fakes in
//! [`platform::memory`](crate::platform::memory) and reports the resulting
//! state as a [`Snapshot`].
//!
//! ```toml
//! location = "#inicio"
//! api_ready = true
//!
//! [[media]]
//! id = "hero"
//! sentinel = true
//!
//! [[media]]
//! id = "song"
//!
//! [[embeds]]
//! id = "clip"
//! src = "https://www.youtube.com/embed/abc"
//!
//! [[steps]]
//! action = "play"
//! target = "song"
//!
//! [[steps]]
//! action = "approach"
//! target = "clip"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chrome::ChromeLabels;
use crate::config::Config;
use crate::i18n::Translations;
use crate::lazy::IntersectionEntry;
use crate::media::{MuteOptions, PlaybackStatus};
use crate::page::{PageAssets, PageContext, SiteRuntime};
use crate::platform::memory::{
    ManualScheduler, MemoryFactory, MemoryFrame, MemoryLoader, MemoryMedia, MemoryStore,
    MemorySurface,
};
use crate::platform::{EmbedFrame, MediaElement, Platform};

// ============================================================================
// Scenario format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Location fragment the page is opened with
    pub location: String,

    /// `location.protocol` of the page
    pub protocol: String,

    /// `location.origin` of the page
    pub origin: String,

    /// Whether the player API is already loaded when the page starts
    pub api_ready: bool,

    pub media: Vec<MediaDecl>,

    pub embeds: Vec<EmbedDecl>,

    /// `{language: {key: text}}`, as embedded in the page
    pub translations: Translations,

    pub steps: Vec<Step>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            location: String::new(),
            protocol: "https:".to_string(),
            origin: "https://localhost".to_string(),
            api_ready: false,
            media: Vec::new(),
            embeds: Vec::new(),
            translations: Translations::default(),
            steps: Vec::new(),
        }
    }
}

/// A native `<audio>`/`<video>` element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDecl {
    pub id: String,

    #[serde(default)]
    pub sentinel: bool,

    /// Reject unmuted `play()` like a browser autoplay policy
    #[serde(default)]
    pub blocks_unmuted_autoplay: bool,
}

/// An embed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedDecl {
    pub id: String,

    pub src: String,

    /// Source assigned in markup instead of deferred
    #[serde(default)]
    pub eager: bool,

    /// Stand-in `src` such as `about:blank` next to the deferred one
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// One scripted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// The visitor starts a native element with its own controls
    Play { target: String },
    Pause { target: String },
    /// The visitor presses play inside an embed
    PlayEmbed { target: String },
    Navigate { to: String },
    LocationChange { to: String },
    SelectTab { group: String, tab: String },
    Mute { muted: bool },
    ToggleMute,
    ToggleLanguage,
    /// An embed comes within the lazy-load margin
    Approach { target: String },
    ClickPlaceholder { target: String },
    ApiReady,
    Advance { ms: u64 },
    Gesture,
    SentinelVisible { visible: bool },
    Reload,
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse scenario: {0}")]
    Parse(String),

    #[error("Step {step}: no {kind} named {target:?}")]
    UnknownTarget {
        step: usize,
        kind: &'static str,
        target: String,
    },
}

impl Scenario {
    pub fn from_toml_str(contents: &str) -> Result<Self, ScenarioError> {
        toml::from_str(contents).map_err(|e| ScenarioError::Parse(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScenarioError::Read(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSnapshot {
    pub playing: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedSnapshot {
    pub src: Option<String>,
    /// Waiting for the player API
    pub pending: bool,
    /// `None` until a controller exists
    pub status: Option<PlaybackStatus>,
}

/// State of the page after the last step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub section: Option<String>,
    pub muted: bool,
    pub language: String,
    pub visits: u64,
    pub playing: Vec<String>,
    pub media: BTreeMap<String, MediaSnapshot>,
    pub embeds: BTreeMap<String, EmbedSnapshot>,
    pub tabs: BTreeMap<String, Option<String>>,
    pub history: Vec<String>,
    pub api_requests: u32,
    pub storage: BTreeMap<String, String>,
    pub labels: ChromeLabels,
}

// ============================================================================
// Replay
// ============================================================================

/// One page load over fresh fakes.
struct LoadedPage {
    runtime: Rc<SiteRuntime>,
    loader: Rc<MemoryLoader>,
    factory: Rc<MemoryFactory>,
    scheduler: Rc<ManualScheduler>,
    surface: Rc<MemorySurface>,
    media: BTreeMap<String, Rc<MemoryMedia>>,
    frames: BTreeMap<String, Rc<MemoryFrame>>,
}

impl LoadedPage {
    fn open(config: &Config, scenario: &Scenario, store: &Rc<MemoryStore>, fragment: &str) -> Self {
        let loader = if scenario.api_ready {
            MemoryLoader::preloaded()
        } else {
            MemoryLoader::new()
        };
        let factory = MemoryFactory::new();
        let scheduler = ManualScheduler::new();
        let surface = MemorySurface::new();

        let mut assets = PageAssets {
            translations: scenario.translations.clone(),
            ..PageAssets::default()
        };
        let mut media = BTreeMap::new();
        for decl in &scenario.media {
            let element = MemoryMedia::new(decl.id.clone());
            element.block_unmuted_autoplay(decl.blocks_unmuted_autoplay);
            if decl.sentinel {
                assets.sentinel = Some(element.clone());
            } else {
                assets.media.push(element.clone());
            }
            media.insert(decl.id.clone(), element);
        }
        let mut frames = BTreeMap::new();
        for decl in &scenario.embeds {
            let frame = match (&decl.placeholder, decl.eager) {
                (_, true) => MemoryFrame::eager(decl.id.clone(), decl.src.clone()),
                (Some(placeholder), false) => MemoryFrame::with_placeholder(
                    decl.id.clone(),
                    placeholder.clone(),
                    decl.src.clone(),
                ),
                (None, false) => MemoryFrame::new(decl.id.clone(), decl.src.clone()),
            };
            assets.frames.push(frame.clone());
            frames.insert(decl.id.clone(), frame);
        }

        let platform = Platform {
            store: store.clone(),
            loader: loader.clone(),
            factory: factory.clone(),
            scheduler: scheduler.clone(),
            surface: surface.clone(),
        };
        let context = PageContext {
            fragment: fragment.to_string(),
            protocol: scenario.protocol.clone(),
            origin: scenario.origin.clone(),
        };
        let runtime = SiteRuntime::start(config.clone(), platform, assets, context);

        Self {
            runtime,
            loader,
            factory,
            scheduler,
            surface,
            media,
            frames,
        }
    }

    fn media(&self, step: usize, target: &str) -> Result<&Rc<MemoryMedia>, ScenarioError> {
        self.media.get(target).ok_or_else(|| ScenarioError::UnknownTarget {
            step,
            kind: "media element",
            target: target.to_string(),
        })
    }

    fn frame(&self, step: usize, target: &str) -> Result<&Rc<MemoryFrame>, ScenarioError> {
        self.frames.get(target).ok_or_else(|| ScenarioError::UnknownTarget {
            step,
            kind: "embed",
            target: target.to_string(),
        })
    }

    fn snapshot(&self, store: &MemoryStore, config: &Config) -> Snapshot {
        let coordinator = self.runtime.coordinator();
        let bridge = coordinator.bridge();

        let media: BTreeMap<String, MediaSnapshot> = self
            .media
            .iter()
            .map(|(id, m)| {
                let snapshot = MediaSnapshot {
                    playing: !m.is_paused(),
                    muted: m.is_muted(),
                };
                (id.clone(), snapshot)
            })
            .collect();

        let embeds: BTreeMap<String, EmbedSnapshot> = self
            .frames
            .iter()
            .map(|(id, f)| {
                let snapshot = EmbedSnapshot {
                    src: f.src(),
                    pending: bridge.is_pending(f.key()),
                    status: bridge.controller(f.key()).map(|c| c.status()),
                };
                (id.clone(), snapshot)
            })
            .collect();

        let mut playing: Vec<String> = media
            .iter()
            .filter(|(_, m)| m.playing)
            .map(|(id, _)| id.clone())
            .collect();
        playing.extend(
            embeds
                .iter()
                .filter(|(_, e)| e.status.is_some_and(PlaybackStatus::is_active))
                .map(|(id, _)| id.clone()),
        );

        let navigator = self.runtime.navigator();
        let tabs = config
            .tabs
            .iter()
            .map(|g| (g.id.clone(), navigator.active_tab(&g.id)))
            .collect();

        Snapshot {
            section: navigator.active_section(),
            muted: coordinator.is_muted(),
            language: self.runtime.language().language(),
            visits: self.runtime.visits(),
            playing,
            media,
            embeds,
            tabs,
            history: self.surface.history(),
            api_requests: self.loader.requests(),
            storage: store.entries(),
            labels: self.runtime.labels(),
        }
    }
}

/// Replay `scenario` and return the final state.
pub fn run(config: &Config, scenario: &Scenario) -> Result<Snapshot, ScenarioError> {
    let store = MemoryStore::new();
    let mut page = LoadedPage::open(config, scenario, &store, &scenario.location);
    tracing::info!("Replaying {} step(s)", scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let step_no = index + 1;
        tracing::debug!("Step {}: {:?}", step_no, step);
        match step {
            Step::Play { target } => page.media(step_no, target)?.start(),
            Step::Pause { target } => {
                if let Err(e) = page.media(step_no, target)?.pause() {
                    tracing::debug!("Pause failed: {}", e);
                }
            }
            Step::PlayEmbed { target } => {
                let key = page.frame(step_no, target)?.key();
                match page.factory.controller(key) {
                    Some(controller) => controller.start(),
                    None => {
                        tracing::warn!("Step {}: {} has no player yet", step_no, target)
                    }
                }
            }
            Step::Navigate { to } => {
                page.runtime.navigate_to(to);
            }
            Step::LocationChange { to } => {
                page.runtime.on_location_change(to);
            }
            Step::SelectTab { group, tab } => {
                page.runtime.select_tab(group, tab);
            }
            Step::Mute { muted } => page
                .runtime
                .coordinator()
                .set_global_muted(*muted, MuteOptions::default()),
            Step::ToggleMute => {
                page.runtime.toggle_mute();
            }
            Step::ToggleLanguage => {
                page.runtime.toggle_language();
            }
            Step::Approach { target } => {
                let key = page.frame(step_no, target)?.key();
                page.runtime.on_intersection(&[IntersectionEntry {
                    key,
                    is_intersecting: true,
                }]);
            }
            Step::ClickPlaceholder { target } => {
                let key = page.frame(step_no, target)?.key();
                page.runtime.lazy().activate_placeholder(key);
            }
            Step::ApiReady => page.loader.finish(),
            Step::Advance { ms } => page.scheduler.advance(Duration::from_millis(*ms)),
            Step::Gesture => page.runtime.on_user_gesture(),
            Step::SentinelVisible { visible } => page.runtime.on_sentinel_visibility(*visible),
            Step::Reload => {
                let fragment = page
                    .runtime
                    .navigator()
                    .active_section()
                    .map(|s| format!("#{s}"))
                    .unwrap_or_default();
                page = LoadedPage::open(config, scenario, &store, &fragment);
            }
        }
    }

    Ok(page.snapshot(&store, config))
}
