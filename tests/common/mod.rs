//! Shared in-memory fakes for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use pagestash::{resolve_url, InlineData, PageAccess, ResourceFetcher};

/// Fetcher backed by in-memory maps keyed on resolved URLs. Counts binary
/// fetches so tests can assert on deduplication.
#[derive(Default)]
pub struct FakeFetcher {
    resources: HashMap<String, (String, Vec<u8>)>,
    texts: HashMap<String, String>,
    pub fetch_count: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(
        mut self,
        url: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.resources
            .insert(url.into(), (mime.into(), bytes.into()));
        self
    }

    pub fn with_text(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(url.into(), text.into());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, base_url: &str) -> Option<InlineData> {
        if url.trim_start().starts_with("data:") {
            return Some(InlineData::from_data_url(url));
        }
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let key = resolve_url(base_url, url).unwrap_or_else(|_| url.to_string());
        self.resources
            .get(&key)
            .map(|(mime, bytes)| InlineData::from_parts(mime, bytes))
    }

    async fn fetch_text(&self, url: &str, base_url: &str) -> Option<String> {
        let key = resolve_url(base_url, url).unwrap_or_else(|_| url.to_string());
        self.texts.get(&key).cloned()
    }
}

/// Page access fake serving recorded frame markup and decoded images.
#[derive(Default)]
pub struct FakePage {
    images: HashMap<String, InlineData>,
    canvases: HashMap<usize, InlineData>,
    frames: HashMap<String, String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoded_image(mut self, src: impl Into<String>, data: InlineData) -> Self {
        self.images.insert(src.into(), data);
        self
    }

    pub fn with_canvas(mut self, index: usize, data: InlineData) -> Self {
        self.canvases.insert(index, data);
        self
    }

    pub fn with_frame(mut self, src: impl Into<String>, markup: impl Into<String>) -> Self {
        self.frames.insert(src.into(), markup.into());
        self
    }
}

#[async_trait]
impl PageAccess for FakePage {
    async fn decoded_image(&self, src: &str) -> Option<InlineData> {
        self.images.get(src).cloned()
    }

    async fn canvas_data(&self, index: usize) -> Option<InlineData> {
        self.canvases.get(&index).cloned()
    }

    async fn frame_markup(&self, src: &str) -> Option<String> {
        self.frames.get(src).cloned()
    }
}
