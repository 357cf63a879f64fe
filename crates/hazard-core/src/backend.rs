use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::decode::RawTensor;
use crate::preprocess::ImageTensor;

/// The model collaborator. Implementations own the network and return the raw
/// `[1, 4 + C, N]` output for one preprocessed frame.
pub trait InferenceBackend: Send {
    fn name(&self) -> &'static str;

    fn infer(&mut self, input: &ImageTensor) -> Result<RawTensor>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Recording {
    Many(Vec<RawTensor>),
    One(RawTensor),
}

/// Plays back recorded model outputs in order, ignoring the pixels it is given.
#[derive(Debug, Clone)]
pub struct ReplayBackend {
    frames: Vec<RawTensor>,
    next: usize,
    looping: bool,
}

impl ReplayBackend {
    pub fn new(frames: Vec<RawTensor>) -> Self {
        Self { frames, next: 0, looping: false }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let frames = match serde_json::from_str::<Recording>(s).context("parse tensor recording")? {
            Recording::Many(v) => v,
            Recording::One(t) => vec![t],
        };
        anyhow::ensure!(!frames.is_empty(), "tensor recording has no frames");
        Ok(Self::new(frames))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let backend = Self::from_json(&s)?;
        info!("replay: loaded {} frame(s) from {}", backend.frames.len(), path.display());
        Ok(backend)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn remaining(&self) -> usize {
        if self.looping { usize::MAX } else { self.frames.len().saturating_sub(self.next) }
    }
}

impl InferenceBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn infer(&mut self, _input: &ImageTensor) -> Result<RawTensor> {
        if self.next >= self.frames.len() {
            anyhow::ensure!(self.looping && !self.frames.is_empty(), "replay exhausted after {} frame(s)", self.frames.len());
            self.next = 0;
        }
        let t = self.frames[self.next].clone();
        self.next += 1;
        Ok(t)
    }
}
