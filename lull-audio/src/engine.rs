//! Software audio context
//!
//! Renders the node graph block by block in topological order. Signals are
//! mono internally and fanned out to every output channel. Parameter
//! connections add the source signal on top of the parameter's base value.

use crate::context::{
    AudioBuffer, AudioContext, AudioError, ContextState, Destination, FilterSpec, NodeId, Param,
};
use crate::decode;
use crate::effects::{Effect, Filter, Gain};
use crate::sources::{BufferPlayer, Oscillator, Waveform};
use std::collections::VecDeque;
use tracing::debug;

/// Playback state of a source node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Created, not yet started
    Idle,
    Playing,
    /// Stopped for good; sources cannot be restarted
    Stopped,
}

enum NodeKind {
    Gain(Gain),
    Filter {
        filter: Filter,
        cutoff: f32,
        q: f32,
    },
    Oscillator(Oscillator),
    Buffer(BufferPlayer),
}

struct Node {
    kind: NodeKind,
    /// `None` for processors
    source: Option<SourceState>,
    /// Set once disconnected; collected when nothing keeps it alive
    detached: bool,
}

impl Node {
    fn processor(kind: NodeKind) -> Self {
        Self {
            kind,
            source: None,
            detached: false,
        }
    }

    fn source(kind: NodeKind) -> Self {
        Self {
            kind,
            source: Some(SourceState::Idle),
            detached: false,
        }
    }

    fn accepts_input(&self) -> bool {
        self.source.is_none()
    }

    fn has_param(&self, param: Param) -> bool {
        matches!(
            (&self.kind, param),
            (NodeKind::Gain(_), Param::Gain)
                | (NodeKind::Filter { .. }, Param::Frequency | Param::Q)
                | (NodeKind::Oscillator(_), Param::Frequency)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    from: NodeId,
    to: Destination,
}

fn target(destination: Destination) -> Option<NodeId> {
    match destination {
        Destination::Node(id) | Destination::Param(id, _) => Some(id),
        Destination::Output => None,
    }
}

fn param_slot(param: Param) -> usize {
    match param {
        Param::Gain => 0,
        Param::Frequency => 1,
        Param::Q => 2,
    }
}

/// In-process [`AudioContext`] that renders into caller-provided buffers
pub struct SoftwareContext {
    state: ContextState,
    sample_rate: u32,
    nodes: Vec<Option<Node>>,
    edges: Vec<Edge>,
    order: Vec<NodeId>,

    // Render scratch, reused across blocks
    outputs: Vec<Vec<f32>>,
    input: Vec<f32>,
    modulation: [Vec<f32>; 3],
    modulated: [bool; 3],
    mix: Vec<f32>,
}

impl SoftwareContext {
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
    const BLOCK_SIZE: usize = 128;

    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: ContextState::Suspended,
            sample_rate: sample_rate.max(1),
            nodes: Vec::new(),
            edges: Vec::new(),
            order: Vec::new(),
            outputs: Vec::new(),
            input: Vec::new(),
            modulation: [Vec::new(), Vec::new(), Vec::new()],
            modulated: [false; 3],
            mix: Vec::new(),
        }
    }

    /// Live nodes in the graph
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn connection_count(&self) -> usize {
        self.edges.len()
    }

    /// Playback state of a source node, `None` for processors and unknown ids
    pub fn source_state(&self, node: NodeId) -> Option<SourceState> {
        self.nodes.get(node.index())?.as_ref()?.source
    }

    /// Render interleaved frames; silent unless running
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        if self.state != ContextState::Running || channels == 0 {
            return;
        }

        let frames = output.len() / channels;
        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(Self::BLOCK_SIZE);
            self.render_block(len);
            let block = &mut output[offset * channels..(offset + len) * channels];
            for (frame, &value) in block.chunks_mut(channels).zip(self.mix.iter()) {
                frame.fill(value);
            }
            offset += len;
        }
    }

    fn render_block(&mut self, len: usize) {
        self.outputs.resize_with(self.nodes.len(), Vec::new);
        let order = std::mem::take(&mut self.order);

        for &id in &order {
            let idx = id.index();

            self.input.clear();
            self.input.resize(len, 0.0);
            for buf in self.modulation.iter_mut() {
                buf.clear();
                buf.resize(len, 0.0);
            }
            self.modulated = [false; 3];

            for edge in &self.edges {
                let (dst, slot) = match edge.to {
                    Destination::Node(t) if t == id => (&mut self.input, None),
                    Destination::Param(t, p) if t == id => {
                        let slot = param_slot(p);
                        (&mut self.modulation[slot], Some(slot))
                    }
                    _ => continue,
                };
                if let Some(slot) = slot {
                    self.modulated[slot] = true;
                }
                let src = &self.outputs[edge.from.index()];
                for (d, s) in dst.iter_mut().zip(src.iter()) {
                    *d += *s;
                }
            }

            let Some(node) = self.nodes[idx].as_mut() else {
                continue;
            };
            let out = &mut self.outputs[idx];
            out.clear();
            out.resize(len, 0.0);
            let playing = node.source.map_or(true, |s| s == SourceState::Playing);

            let gain_mod = &self.modulation[param_slot(Param::Gain)];
            let freq_mod = &self.modulation[param_slot(Param::Frequency)];
            let q_mod = &self.modulation[param_slot(Param::Q)];
            let [gain_on, freq_on, q_on] = self.modulated;

            match &mut node.kind {
                NodeKind::Gain(gain) => {
                    out.copy_from_slice(&self.input);
                    if gain_on {
                        let base = gain.value();
                        for (o, m) in out.iter_mut().zip(gain_mod.iter()) {
                            *o *= base + m;
                        }
                    } else {
                        gain.process(out);
                    }
                }
                NodeKind::Filter { filter, cutoff, q } => {
                    out.copy_from_slice(&self.input);
                    if freq_on || q_on {
                        for i in 0..len {
                            filter.set_cutoff(*cutoff + freq_mod[i]);
                            filter.set_resonance(*q + q_mod[i]);
                            out[i] = filter.process_sample(out[i]);
                        }
                    } else {
                        filter.set_cutoff(*cutoff);
                        filter.set_resonance(*q);
                        filter.process(out);
                    }
                }
                NodeKind::Oscillator(osc) if playing => {
                    for (o, m) in out.iter_mut().zip(freq_mod.iter()) {
                        *o = osc.next_sample(*m);
                    }
                }
                NodeKind::Buffer(player) if playing => player.fill(out),
                _ => {}
            }
        }

        self.mix.clear();
        self.mix.resize(len, 0.0);
        for edge in self.edges.iter().filter(|e| e.to == Destination::Output) {
            for (m, s) in self.mix.iter_mut().zip(self.outputs[edge.from.index()].iter()) {
                *m += *s;
            }
        }

        self.order = order;
    }

    fn ensure_open(&self) -> Result<(), AudioError> {
        if self.state == ContextState::Closed {
            Err(AudioError::Closed)
        } else {
            Ok(())
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, AudioError> {
        self.nodes
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .ok_or(AudioError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, AudioError> {
        self.nodes
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .ok_or(AudioError::UnknownNode(id))
    }

    fn insert(&mut self, node: Node) -> Result<NodeId, AudioError> {
        self.ensure_open()?;
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.refresh_order();
        Ok(id)
    }

    /// Kahn's algorithm over audio and parameter edges; `None` on a cycle
    fn topological_order(&self) -> Option<Vec<NodeId>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in &self.edges {
            if let Some(t) = target(edge.to) {
                in_degree[t.index()] += 1;
                adjacency[edge.from.index()].push(t.index());
            }
        }

        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&i| self.nodes[i].is_some() && in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(NodeId::new(i as u32));
            for &t in &adjacency[i] {
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    queue.push_back(t);
                }
            }
        }

        (order.len() == self.node_count()).then_some(order)
    }

    fn refresh_order(&mut self) {
        self.order = self.topological_order().unwrap_or_default();
    }

    /// Drop detached nodes that no longer feed anything and are not fed
    /// by a playing source
    fn collect_detached(&mut self) {
        loop {
            let removable: Vec<usize> = self
                .nodes
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| {
                    let node = slot.as_ref()?;
                    let id = NodeId::new(i as u32);
                    if !node.detached || self.edges.iter().any(|e| e.from == id) {
                        return None;
                    }
                    let alive = match node.source {
                        Some(state) => state == SourceState::Playing,
                        None => self.edges.iter().any(|e| target(e.to) == Some(id)),
                    };
                    (!alive).then_some(i)
                })
                .collect();

            if removable.is_empty() {
                break;
            }
            for i in removable {
                let id = NodeId::new(i as u32);
                self.nodes[i] = None;
                if let Some(buf) = self.outputs.get_mut(i) {
                    *buf = Vec::new();
                }
                self.edges.retain(|e| target(e.to) != Some(id));
                debug!("Released node {}", id);
            }
        }
        self.refresh_order();
    }
}

impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SAMPLE_RATE)
    }
}

impl AudioContext for SoftwareContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.ensure_open()?;
        self.state = ContextState::Running;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.ensure_open()?;
        self.state = ContextState::Closed;
        self.nodes.clear();
        self.edges.clear();
        self.order.clear();
        self.outputs.clear();
        Ok(())
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId, AudioError> {
        self.insert(Node::processor(NodeKind::Gain(Gain::new(gain))))
    }

    fn create_filter(&mut self, spec: FilterSpec) -> Result<NodeId, AudioError> {
        let filter = Filter::new(spec.filter_type, self.sample_rate as f32, spec.cutoff, spec.q);
        self.insert(Node::processor(NodeKind::Filter {
            filter,
            cutoff: spec.cutoff,
            q: spec.q,
        }))
    }

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency: f32,
    ) -> Result<NodeId, AudioError> {
        let osc = Oscillator::new(waveform, frequency, self.sample_rate as f32);
        self.insert(Node::source(NodeKind::Oscillator(osc)))
    }

    fn create_buffer_source(
        &mut self,
        buffer: AudioBuffer,
        looping: bool,
    ) -> Result<NodeId, AudioError> {
        self.insert(Node::source(NodeKind::Buffer(BufferPlayer::new(buffer, looping))))
    }

    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<(), AudioError> {
        self.ensure_open()?;
        self.node(node)?;
        let invalid = AudioError::InvalidConnection {
            from: node,
            to: destination,
        };

        match destination {
            Destination::Node(t) => {
                if t == node || !self.node(t)?.accepts_input() {
                    return Err(invalid);
                }
            }
            Destination::Param(t, param) => {
                if t == node {
                    return Err(invalid);
                }
                if !self.node(t)?.has_param(param) {
                    return Err(AudioError::UnknownParam(t, param));
                }
            }
            Destination::Output => {}
        }

        let edge = Edge {
            from: node,
            to: destination,
        };
        if self.edges.contains(&edge) {
            return Ok(());
        }
        self.edges.push(edge);
        match self.topological_order() {
            Some(order) => {
                self.order = order;
                Ok(())
            }
            None => {
                self.edges.pop();
                Err(invalid)
            }
        }
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.ensure_open()?;
        self.node_mut(node)?.detached = true;
        self.edges.retain(|e| e.from != node);
        self.collect_detached();
        Ok(())
    }

    fn start(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.ensure_open()?;
        let entry = self.node_mut(node)?;
        match entry.source {
            None => Err(AudioError::NotASource(node)),
            Some(SourceState::Idle) => {
                entry.source = Some(SourceState::Playing);
                Ok(())
            }
            Some(_) => Err(AudioError::AlreadyStarted(node)),
        }
    }

    fn stop(&mut self, node: NodeId) -> Result<(), AudioError> {
        self.ensure_open()?;
        let entry = self.node_mut(node)?;
        match entry.source {
            None => Err(AudioError::NotASource(node)),
            Some(SourceState::Playing) => {
                entry.source = Some(SourceState::Stopped);
                let detached = entry.detached;
                if detached {
                    self.collect_detached();
                }
                Ok(())
            }
            Some(_) => Err(AudioError::NotStarted(node)),
        }
    }

    fn set_param(&mut self, node: NodeId, param: Param, value: f32) -> Result<(), AudioError> {
        self.ensure_open()?;
        let entry = self.node_mut(node)?;
        match (&mut entry.kind, param) {
            (NodeKind::Gain(gain), Param::Gain) => gain.set(value),
            (NodeKind::Filter { cutoff, .. }, Param::Frequency) => *cutoff = value,
            (NodeKind::Filter { q, .. }, Param::Q) => *q = value,
            (NodeKind::Oscillator(osc), Param::Frequency) => osc.set_frequency(value),
            _ => return Err(AudioError::UnknownParam(node, param)),
        }
        Ok(())
    }

    fn param(&self, node: NodeId, param: Param) -> Result<f32, AudioError> {
        match (&self.node(node)?.kind, param) {
            (NodeKind::Gain(gain), Param::Gain) => Ok(gain.value()),
            (NodeKind::Filter { cutoff, .. }, Param::Frequency) => Ok(*cutoff),
            (NodeKind::Filter { q, .. }, Param::Q) => Ok(*q),
            (NodeKind::Oscillator(osc), Param::Frequency) => Ok(osc.frequency()),
            _ => Err(AudioError::UnknownParam(node, param)),
        }
    }

    fn decode_audio_data(&self, bytes: &[u8]) -> Result<AudioBuffer, AudioError> {
        self.ensure_open()?;
        decode::decode(bytes, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::FilterType;

    fn running() -> SoftwareContext {
        let mut ctx = SoftwareContext::new(48000);
        ctx.resume().unwrap();
        ctx
    }

    fn constant(ctx: &mut SoftwareContext, value: f32) -> NodeId {
        let buffer = AudioBuffer::from_samples(vec![value; 4], ctx.sample_rate(), 1).unwrap();
        ctx.create_buffer_source(buffer, true).unwrap()
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_starts_suspended_and_silent() {
        let mut ctx = SoftwareContext::default();
        assert_eq!(ctx.state(), ContextState::Suspended);
        let osc = ctx.create_oscillator(Waveform::Sine, 440.0).unwrap();
        ctx.connect(osc, Destination::Output).unwrap();
        ctx.start(osc).unwrap();

        let mut out = vec![1.0; 256];
        ctx.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gain_chain_renders() {
        let mut ctx = running();
        let src = constant(&mut ctx, 1.0);
        let gain = ctx.create_gain(0.4).unwrap();
        ctx.connect(src, Destination::Node(gain)).unwrap();
        ctx.connect(gain, Destination::Output).unwrap();
        ctx.start(src).unwrap();

        let mut out = vec![0.0; 600];
        ctx.render(&mut out, 2);
        assert!(out.iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_zero_gain_is_silent() {
        let mut ctx = running();
        let osc = ctx.create_oscillator(Waveform::Square, 220.0).unwrap();
        let gain = ctx.create_gain(0.0).unwrap();
        ctx.connect(osc, Destination::Node(gain)).unwrap();
        ctx.connect(gain, Destination::Output).unwrap();
        ctx.start(osc).unwrap();

        let mut out = vec![0.0; 512];
        ctx.render(&mut out, 1);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_unstarted_source_is_silent() {
        let mut ctx = running();
        let src = constant(&mut ctx, 1.0);
        ctx.connect(src, Destination::Output).unwrap();

        let mut out = vec![0.0; 64];
        ctx.render(&mut out, 1);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_param_connection_adds_to_base() {
        let mut ctx = running();
        let src = constant(&mut ctx, 1.0);
        let level = constant(&mut ctx, 0.5);
        let gain = ctx.create_gain(0.0).unwrap();
        ctx.connect(src, Destination::Node(gain)).unwrap();
        ctx.connect(level, Destination::Param(gain, Param::Gain)).unwrap();
        ctx.connect(gain, Destination::Output).unwrap();
        ctx.start(src).unwrap();
        ctx.start(level).unwrap();

        let mut out = vec![0.0; 64];
        ctx.render(&mut out, 1);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert_eq!(ctx.param(gain, Param::Gain).unwrap(), 0.0);
    }

    #[test]
    fn test_modulated_filter_keeps_base_cutoff() {
        let mut ctx = running();
        let filter = ctx
            .create_filter(FilterSpec::new(FilterType::LowPass, 400.0))
            .unwrap();
        let lfo = ctx.create_oscillator(Waveform::Sine, 0.2).unwrap();
        let depth = ctx.create_gain(50.0).unwrap();
        ctx.connect(lfo, Destination::Node(depth)).unwrap();
        ctx.connect(depth, Destination::Param(filter, Param::Frequency))
            .unwrap();
        ctx.start(lfo).unwrap();

        let mut out = vec![0.0; 4800];
        ctx.render(&mut out, 1);
        assert_eq!(ctx.param(filter, Param::Frequency).unwrap(), 400.0);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut ctx = running();
        let a = ctx.create_gain(1.0).unwrap();
        let b = ctx.create_gain(1.0).unwrap();
        ctx.connect(a, Destination::Node(b)).unwrap();
        let result = ctx.connect(b, Destination::Node(a));
        assert!(matches!(result, Err(AudioError::InvalidConnection { .. })));
        assert_eq!(ctx.connection_count(), 1);
    }

    #[test]
    fn test_cannot_feed_a_source() {
        let mut ctx = running();
        let gain = ctx.create_gain(1.0).unwrap();
        let osc = ctx.create_oscillator(Waveform::Sine, 440.0).unwrap();
        assert!(ctx.connect(gain, Destination::Node(osc)).is_err());
        assert!(matches!(
            ctx.connect(osc, Destination::Param(gain, Param::Q)),
            Err(AudioError::UnknownParam(_, Param::Q))
        ));
    }

    #[test]
    fn test_duplicate_connect_is_ignored() {
        let mut ctx = running();
        let gain = ctx.create_gain(1.0).unwrap();
        ctx.connect(gain, Destination::Output).unwrap();
        ctx.connect(gain, Destination::Output).unwrap();
        assert_eq!(ctx.connection_count(), 1);
    }

    #[test]
    fn test_source_lifecycle() {
        let mut ctx = running();
        let osc = ctx.create_oscillator(Waveform::Sine, 440.0).unwrap();
        assert!(matches!(ctx.stop(osc), Err(AudioError::NotStarted(_))));
        ctx.start(osc).unwrap();
        assert!(matches!(ctx.start(osc), Err(AudioError::AlreadyStarted(_))));
        ctx.stop(osc).unwrap();
        assert_eq!(ctx.source_state(osc), Some(SourceState::Stopped));
        assert!(matches!(ctx.stop(osc), Err(AudioError::NotStarted(_))));

        let gain = ctx.create_gain(1.0).unwrap();
        assert!(matches!(ctx.start(gain), Err(AudioError::NotASource(_))));
    }

    #[test]
    fn test_released_chain_is_collected() {
        let mut ctx = running();
        let osc = ctx.create_oscillator(Waveform::Sine, 440.0).unwrap();
        let filter = ctx
            .create_filter(FilterSpec::new(FilterType::BandPass, 1000.0))
            .unwrap();
        let gain = ctx.create_gain(0.0).unwrap();
        ctx.connect(osc, Destination::Node(filter)).unwrap();
        ctx.connect(filter, Destination::Node(gain)).unwrap();
        ctx.connect(gain, Destination::Output).unwrap();
        ctx.start(osc).unwrap();
        assert_eq!(ctx.node_count(), 3);

        ctx.stop(osc).unwrap();
        ctx.disconnect(osc).unwrap();
        ctx.disconnect(filter).unwrap();
        ctx.disconnect(gain).unwrap();
        assert_eq!(ctx.node_count(), 0);
        assert_eq!(ctx.connection_count(), 0);
        assert!(matches!(ctx.stop(osc), Err(AudioError::UnknownNode(_))));
    }

    #[test]
    fn test_closed_context_refuses_mutation() {
        let mut ctx = running();
        let gain = ctx.create_gain(1.0).unwrap();
        ctx.close().unwrap();
        assert_eq!(ctx.state(), ContextState::Closed);
        assert_eq!(ctx.close(), Err(AudioError::Closed));
        assert_eq!(ctx.resume(), Err(AudioError::Closed));
        assert_eq!(ctx.create_gain(1.0), Err(AudioError::Closed));
        assert_eq!(ctx.set_gain(gain, 0.5), Err(AudioError::Closed));
        assert!(matches!(ctx.create_buffer(1, 16), Err(AudioError::Closed)));
    }

    #[test]
    fn test_output_fans_out_to_channels() {
        let mut ctx = running();
        let src = constant(&mut ctx, 0.25);
        ctx.connect(src, Destination::Output).unwrap();
        ctx.start(src).unwrap();

        let mut out = vec![0.0; 6];
        ctx.render(&mut out, 3);
        assert_eq!(out, vec![0.25; 6]);
    }
}
