//! Thread-shared software context
//!
//! The control thread drives the graph through [`AudioContext`] while the
//! device callback pulls samples with [`SharedContext::render`].

use crate::context::{
    AudioBuffer, AudioContext, AudioError, ContextState, Destination, FilterSpec, NodeId, Param,
};
use crate::engine::SoftwareContext;
use crate::sources::Waveform;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to a [`SoftwareContext`] behind a mutex
#[derive(Clone)]
pub struct SharedContext {
    inner: Arc<Mutex<SoftwareContext>>,
}

impl SharedContext {
    pub fn new(context: SoftwareContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// Render from the audio thread; outputs silence if the graph is busy
    pub fn render(&self, output: &mut [f32], channels: usize) {
        match self.inner.try_lock() {
            Some(mut context) => context.render(output, channels),
            None => output.fill(0.0),
        }
    }

    /// Direct access for inspection
    pub fn lock(&self) -> MutexGuard<'_, SoftwareContext> {
        self.inner.lock()
    }
}

impl AudioContext for SharedContext {
    fn state(&self) -> ContextState {
        self.inner.lock().state()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.inner.lock().resume()
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.inner.lock().close()
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId, AudioError> {
        self.inner.lock().create_gain(gain)
    }

    fn create_filter(&mut self, spec: FilterSpec) -> Result<NodeId, AudioError> {
        self.inner.lock().create_filter(spec)
    }

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency: f32,
    ) -> Result<NodeId, AudioError> {
        self.inner.lock().create_oscillator(waveform, frequency)
    }

    fn create_buffer_source(
        &mut self,
        buffer: AudioBuffer,
        looping: bool,
    ) -> Result<NodeId, AudioError> {
        self.inner.lock().create_buffer_source(buffer, looping)
    }

    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<(), AudioError> {
        self.inner.lock().connect(node, destination)
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.inner.lock().disconnect(node)
    }

    fn start(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.inner.lock().start(node)
    }

    fn stop(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.inner.lock().stop(node)
    }

    fn set_param(&mut self, node: NodeId, param: Param, value: f32) -> Result<(), AudioError> {
        self.inner.lock().set_param(node, param, value)
    }

    fn param(&self, node: NodeId, param: Param) -> Result<f32, AudioError> {
        self.inner.lock().param(node, param)
    }

    fn decode_audio_data(&self, bytes: &[u8]) -> Result<AudioBuffer, AudioError> {
        // Decode outside the lock so rendering is not starved
        let sample_rate = {
            let context = self.inner.lock();
            if context.state() == ContextState::Closed {
                return Err(AudioError::Closed);
            }
            context.sample_rate()
        };
        crate::decode::decode(bytes, sample_rate)
    }
}
