//! Photo lightbox state.

use serde::{Deserialize, Serialize};

/// One photo in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub caption: String,
}

/// What a key press or button in the open lightbox does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightboxAction {
    Close,
    Previous,
    Next,
}

impl LightboxAction {
    /// Map a `KeyboardEvent.key` value.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Escape" => Some(Self::Close),
            "ArrowLeft" => Some(Self::Previous),
            "ArrowRight" => Some(Self::Next),
            _ => None,
        }
    }
}

/// Carousel over the gallery photos. Navigation wraps around at both ends
/// and only works while open.
#[derive(Debug, Clone, Default)]
pub struct Lightbox {
    photos: Vec<Photo>,
    current: usize,
    open: bool,
    /// Index of the thumbnail that opened the lightbox.
    trigger: Option<usize>,
}

impl Lightbox {
    pub fn new(photos: Vec<Photo>) -> Self {
        Self {
            photos,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// The photo on display, if open.
    pub fn current(&self) -> Option<&Photo> {
        if self.open {
            self.photos.get(self.current)
        } else {
            None
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.open.then_some(self.current)
    }

    /// Index of the thumbnail that opened the lightbox, while open.
    pub fn trigger(&self) -> Option<usize> {
        if self.open { self.trigger } else { None }
    }

    /// Open at `index`. Out-of-range indexes are ignored.
    pub fn open(&mut self, index: usize) -> bool {
        if index >= self.photos.len() {
            return false;
        }
        self.current = index;
        self.trigger = Some(index);
        self.open = true;
        true
    }

    /// Close and return the thumbnail index that should get focus back.
    pub fn close(&mut self) -> Option<usize> {
        if !self.open {
            return None;
        }
        self.open = false;
        self.trigger.take()
    }

    /// Step by `delta` photos, wrapping around.
    pub fn step(&mut self, delta: isize) -> Option<usize> {
        if !self.open || self.photos.is_empty() {
            return None;
        }
        let total = self.photos.len() as isize;
        self.current = (self.current as isize + delta).rem_euclid(total) as usize;
        Some(self.current)
    }

    pub fn next(&mut self) -> Option<usize> {
        self.step(1)
    }

    pub fn previous(&mut self) -> Option<usize> {
        self.step(-1)
    }

    /// Handle a key press. Returns `true` if the key was consumed.
    pub fn handle_key(&mut self, key: &str) -> bool {
        match LightboxAction::from_key(key) {
            Some(action) => self.apply(action),
            None => false,
        }
    }

    /// Run a close, previous or next action. Returns `true` if the lightbox
    /// was open.
    pub fn apply(&mut self, action: LightboxAction) -> bool {
        if !self.open {
            return false;
        }
        match action {
            LightboxAction::Close => {
                self.close();
                true
            }
            LightboxAction::Previous => self.previous().is_some(),
            LightboxAction::Next => self.next().is_some(),
        }
    }

    /// A click landed on the overlay. Only clicks on the backdrop itself,
    /// outside the photo and buttons, close it.
    pub fn on_overlay_click(&mut self, on_backdrop: bool) -> bool {
        on_backdrop && self.apply(LightboxAction::Close)
    }
}
