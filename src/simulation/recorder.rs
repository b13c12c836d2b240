//! Per-step snapshot sink
//!
//! The driver hands every attached recorder an ordered, index-aligned copy of
//! the particle positions after each completed step. Persistence is up to the
//! implementation; [`FrameRecorder`] just keeps the frames in memory.

use crate::simulation::states::NVec3;

pub trait Recorder {
    /// Consume one frame: `positions[i]` is particle `i`'s position
    fn add_frame(&mut self, positions: &[NVec3]);
}

/// In-memory recorder keeping every frame in order
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    frames: Vec<Vec<NVec3>>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Vec<NVec3>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn into_frames(self) -> Vec<Vec<NVec3>> {
        self.frames
    }
}

impl Recorder for FrameRecorder {
    fn add_frame(&mut self, positions: &[NVec3]) {
        self.frames.push(positions.to_vec());
    }
}
