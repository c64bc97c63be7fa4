//! Graph Builder
//!
//! Turns catalog entries into running, initially silent sources, each
//! ending in its own gain point wired to the shared output:
//!
//! ```text
//! source -> [filter] -> gain(0) -> output
//! ```
//!
//! Sources start at once and loop forever. Silence afterwards is purely a
//! gain value; sources are only stopped at teardown. Handles live in an
//! arena keyed by sound name, owned by whoever owns the [`SoundGraph`].

use lull_audio::{
    AudioBuffer, AudioContext, AudioError, ContextState, Destination, FilterSpec, FilterType,
    NodeId, NoiseColor, NoiseGenerator, Waveform,
};
use lull_library::{asset_file_name, AssetEvent, AssetFetcher, Category, SoundDescriptor, Voice};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of procedural noise buffers
const NOISE_SECONDS: f32 = 2.0;

/// Where sources come from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceStrategy {
    /// Synthesize every sound from its voice
    #[default]
    Procedural,
    /// Decode `<name>.<extension>` files from `dir`, fetched in the background
    Assets { dir: PathBuf, extension: String },
}

/// Why a single sound could not be built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("Asset unavailable: {0}")]
    Asset(String),
}

/// A sound left without a handle
#[derive(Debug, Clone, PartialEq)]
pub struct BuildFailure {
    pub sound: String,
    pub error: BuildError,
}

/// What happened to an arriving asset
#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    Attached(String),
    /// Arrived after teardown or for a sound that already has a handle
    Discarded(String),
    Failed(BuildFailure),
}

/// Nodes owned by one sound
#[derive(Debug, Clone, Default)]
struct NodeSet {
    sources: Vec<NodeId>,
    processors: Vec<NodeId>,
}

impl NodeSet {
    /// Stop and disconnect everything, ignoring stale-node errors
    fn release<C: AudioContext + ?Sized>(&self, ctx: &mut C) {
        for &node in &self.sources {
            let _ = ctx.stop(node);
            let _ = ctx.disconnect(node);
        }
        for &node in &self.processors {
            let _ = ctx.disconnect(node);
        }
    }
}

/// Control handle for one sound: its gain point and the nodes feeding it
#[derive(Debug, Clone)]
pub struct SoundHandle {
    gain: NodeId,
    nodes: NodeSet,
}

impl SoundHandle {
    /// The gain point
    pub fn gain(&self) -> NodeId {
        self.gain
    }

    /// Started sources (main source plus any modulators)
    pub fn sources(&self) -> &[NodeId] {
        &self.nodes.sources
    }
}

/// Arena of per-sound handles for one session
pub struct SoundGraph {
    handles: HashMap<String, SoundHandle>,
    pending: HashSet<String>,
    fetcher: Option<AssetFetcher>,
    released: bool,
}

impl SoundGraph {
    /// Graph with no handles
    pub fn empty() -> Self {
        Self {
            handles: HashMap::new(),
            pending: HashSet::new(),
            fetcher: None,
            released: false,
        }
    }

    /// Build every sound with `strategy`.
    ///
    /// Failures are isolated per sound and returned alongside the graph.
    /// With [`SourceStrategy::Assets`] no handle exists yet; arrivals are
    /// wired by [`SoundGraph::poll_assets`] or [`SoundGraph::wait_asset`].
    pub fn build_all<C: AudioContext + ?Sized>(
        ctx: &mut C,
        sounds: &[SoundDescriptor],
        strategy: &SourceStrategy,
    ) -> (Self, Vec<BuildFailure>) {
        let mut graph = Self::empty();
        let mut failures = Vec::new();

        match strategy {
            SourceStrategy::Procedural => {
                for sound in sounds {
                    match build_procedural(ctx, sound) {
                        Ok(handle) => {
                            debug!("Built {} (gain {})", sound.name, handle.gain);
                            graph.handles.insert(sound.name.to_string(), handle);
                        }
                        Err(error) => {
                            warn!("Failed to create {} sound: {}", sound.name, error);
                            failures.push(BuildFailure {
                                sound: sound.name.to_string(),
                                error: error.into(),
                            });
                        }
                    }
                }
                info!("Built {}/{} sounds", graph.handles.len(), sounds.len());
            }
            SourceStrategy::Assets { dir, extension } => {
                let fetcher = AssetFetcher::spawn(dir.clone());
                for sound in sounds {
                    let file = asset_file_name(sound.name, extension);
                    if fetcher.request(sound.name, &file) {
                        graph.pending.insert(sound.name.to_string());
                    } else {
                        failures.push(BuildFailure {
                            sound: sound.name.to_string(),
                            error: BuildError::Asset("asset worker stopped".into()),
                        });
                    }
                }
                info!(
                    "Requested {} sound assets from {}",
                    graph.pending.len(),
                    dir.display()
                );
                graph.fetcher = Some(fetcher);
            }
        }

        (graph, failures)
    }

    /// Decode an asset and wire it as `name`'s looping source
    pub fn attach_asset<C: AudioContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        name: &str,
        bytes: &[u8],
    ) -> Result<AssetOutcome, BuildFailure> {
        self.pending.remove(name);

        if self.released || ctx.state() == ContextState::Closed || self.handles.contains_key(name)
        {
            debug!("Discarding asset for {}", name);
            return Ok(AssetOutcome::Discarded(name.to_string()));
        }

        let handle = build_from_bytes(ctx, bytes).map_err(|error| {
            warn!("Failed to create {} sound: {}", name, error);
            BuildFailure {
                sound: name.to_string(),
                error: error.into(),
            }
        })?;
        debug!("Attached asset for {} (gain {})", name, handle.gain);
        self.handles.insert(name.to_string(), handle);
        Ok(AssetOutcome::Attached(name.to_string()))
    }

    /// Wire every asset that has arrived, without blocking
    pub fn poll_assets<C: AudioContext + ?Sized>(&mut self, ctx: &mut C) -> Vec<AssetOutcome> {
        let mut outcomes = Vec::new();
        while let Some(event) = self.fetcher.as_ref().and_then(|f| f.try_next()) {
            outcomes.push(self.handle_event(ctx, event));
        }
        outcomes
    }

    /// Block up to `timeout` for the next arrival and wire it
    pub fn wait_asset<C: AudioContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        timeout: Duration,
    ) -> Option<AssetOutcome> {
        let event = self.fetcher.as_ref()?.wait_next(timeout)?;
        Some(self.handle_event(ctx, event))
    }

    fn handle_event<C: AudioContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        event: AssetEvent,
    ) -> AssetOutcome {
        match event {
            AssetEvent::Loaded { sound, bytes } => self
                .attach_asset(ctx, &sound, &bytes)
                .unwrap_or_else(AssetOutcome::Failed),
            AssetEvent::Failed { sound, error } => {
                self.pending.remove(&sound);
                if self.released {
                    return AssetOutcome::Discarded(sound);
                }
                warn!("Failed to create {} sound: {}", sound, error);
                AssetOutcome::Failed(BuildFailure {
                    sound,
                    error: BuildError::Asset(error),
                })
            }
        }
    }

    /// Assets requested but not yet resolved
    pub fn pending_assets(&self) -> usize {
        self.pending.len()
    }

    /// Whether `name`'s asset was requested and has not resolved yet
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains(name)
    }

    /// Set a sound's gain; `Ok(false)` if it has no handle
    pub fn set_gain<C: AudioContext + ?Sized>(
        &self,
        ctx: &mut C,
        name: &str,
        value: f32,
    ) -> Result<bool, AudioError> {
        match self.handles.get(name) {
            Some(handle) => {
                ctx.set_gain(handle.gain, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current gain of a sound's gain point
    pub fn gain<C: AudioContext + ?Sized>(&self, ctx: &C, name: &str) -> Option<f32> {
        let handle = self.handles.get(name)?;
        ctx.param(handle.gain, lull_audio::Param::Gain).ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    pub fn handle(&self, name: &str) -> Option<&SoundHandle> {
        self.handles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop and disconnect every handle, then close the context.
    ///
    /// Safe to call repeatedly.
    pub fn release_all<C: AudioContext + ?Sized>(&mut self, ctx: &mut C) {
        if self.released {
            return;
        }
        self.released = true;

        for (name, handle) in self.handles.drain() {
            debug!("Releasing {}", name);
            handle.nodes.release(ctx);
        }
        self.pending.clear();
        // Joins the worker
        self.fetcher.take();

        if ctx.state() != ContextState::Closed {
            if let Err(e) = ctx.close() {
                debug!("Context close: {}", e);
            }
        }
        info!("Sound graph released");
    }
}

impl Default for SoundGraph {
    fn default() -> Self {
        Self::empty()
    }
}

/// Voice used when a descriptor carries none
pub fn default_voice(category: Category) -> Voice {
    match category {
        Category::Noise => Voice::Noise {
            color: NoiseColor::White,
        },
        Category::Melody => Voice::Tone {
            frequency: 440.0,
            waveform: Waveform::Sine,
        },
        Category::Nature => Voice::Texture {
            filter: FilterType::BandPass,
            cutoff: 1000.0,
            q: 1.0,
            swell: None,
        },
    }
}

/// Shaping filter for each noise color
fn noise_filter(color: NoiseColor) -> FilterSpec {
    match color {
        NoiseColor::White => FilterSpec::new(FilterType::HighPass, 100.0),
        NoiseColor::Pink => FilterSpec::new(FilterType::LowPass, 2000.0),
        NoiseColor::Brown => FilterSpec::new(FilterType::LowPass, 500.0),
    }
}

/// FNV-1a, so each sound gets its own noise
fn seed_for(name: &str) -> u64 {
    name.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

fn build_procedural<C: AudioContext + ?Sized>(
    ctx: &mut C,
    sound: &SoundDescriptor,
) -> Result<SoundHandle, AudioError> {
    let voice = sound.voice.unwrap_or_else(|| default_voice(sound.category));
    let seed = seed_for(sound.name);
    let mut nodes = NodeSet::default();

    let chain = match voice {
        Voice::Noise { color } => build_noise(ctx, &mut nodes, color, seed),
        Voice::Tone {
            frequency,
            waveform,
        } => build_tone(ctx, &mut nodes, frequency, waveform),
        Voice::Texture {
            filter,
            cutoff,
            q,
            swell,
        } => build_texture(
            ctx,
            &mut nodes,
            seed,
            FilterSpec::new(filter, cutoff).with_q(q),
            swell.map(|s| (s.rate_hz, s.depth_hz)),
        ),
    };

    finish(ctx, nodes, chain)
}

fn build_from_bytes<C: AudioContext + ?Sized>(
    ctx: &mut C,
    bytes: &[u8],
) -> Result<SoundHandle, AudioError> {
    let mut nodes = NodeSet::default();
    let chain = ctx.decode_audio_data(bytes).and_then(|buffer| {
        let source = ctx.create_buffer_source(buffer, true)?;
        nodes.sources.push(source);
        Ok(source)
    });
    finish(ctx, nodes, chain)
}

/// Append the gain point, wire it to the output and start every source.
/// On any failure the partial chain is released.
fn finish<C: AudioContext + ?Sized>(
    ctx: &mut C,
    mut nodes: NodeSet,
    chain: Result<NodeId, AudioError>,
) -> Result<SoundHandle, AudioError> {
    let result = chain.and_then(|tail| {
        let gain = ctx.create_gain(0.0)?;
        nodes.processors.push(gain);
        ctx.connect(tail, Destination::Node(gain))?;
        ctx.connect(gain, Destination::Output)?;
        for &source in &nodes.sources {
            ctx.start(source)?;
        }
        Ok(gain)
    });

    match result {
        Ok(gain) => Ok(SoundHandle { gain, nodes }),
        Err(e) => {
            nodes.release(ctx);
            Err(e)
        }
    }
}

fn noise_buffer<C: AudioContext + ?Sized>(
    ctx: &mut C,
    color: NoiseColor,
    seed: u64,
) -> Result<AudioBuffer, AudioError> {
    let frames = (ctx.sample_rate() as f32 * NOISE_SECONDS) as usize;
    let mut buffer = ctx.create_buffer(1, frames)?;
    NoiseGenerator::with_seed(seed).fill(buffer.samples_mut(), color);
    Ok(buffer)
}

fn build_noise<C: AudioContext + ?Sized>(
    ctx: &mut C,
    nodes: &mut NodeSet,
    color: NoiseColor,
    seed: u64,
) -> Result<NodeId, AudioError> {
    let buffer = noise_buffer(ctx, color, seed)?;
    let source = ctx.create_buffer_source(buffer, true)?;
    nodes.sources.push(source);
    let filter = ctx.create_filter(noise_filter(color))?;
    nodes.processors.push(filter);
    ctx.connect(source, Destination::Node(filter))?;
    Ok(filter)
}

fn build_tone<C: AudioContext + ?Sized>(
    ctx: &mut C,
    nodes: &mut NodeSet,
    frequency: f32,
    waveform: Waveform,
) -> Result<NodeId, AudioError> {
    let osc = ctx.create_oscillator(waveform, frequency)?;
    nodes.sources.push(osc);
    Ok(osc)
}

fn build_texture<C: AudioContext + ?Sized>(
    ctx: &mut C,
    nodes: &mut NodeSet,
    seed: u64,
    spec: FilterSpec,
    swell: Option<(f32, f32)>,
) -> Result<NodeId, AudioError> {
    let buffer = noise_buffer(ctx, NoiseColor::White, seed)?;
    let source = ctx.create_buffer_source(buffer, true)?;
    nodes.sources.push(source);
    let filter = ctx.create_filter(spec)?;
    nodes.processors.push(filter);
    ctx.connect(source, Destination::Node(filter))?;

    if let Some((rate_hz, depth_hz)) = swell {
        let mut modulation = NodeSet::default();
        match build_swell(ctx, &mut modulation, filter, rate_hz, depth_hz) {
            Ok(()) => {
                nodes.sources.append(&mut modulation.sources);
                nodes.processors.append(&mut modulation.processors);
            }
            Err(e) => {
                warn!("Could not create cutoff swell, keeping a static filter: {}", e);
                modulation.release(ctx);
            }
        }
    }

    Ok(filter)
}

/// Sine LFO scaled by `depth_hz` onto the filter cutoff
fn build_swell<C: AudioContext + ?Sized>(
    ctx: &mut C,
    nodes: &mut NodeSet,
    filter: NodeId,
    rate_hz: f32,
    depth_hz: f32,
) -> Result<(), AudioError> {
    let lfo = ctx.create_oscillator(Waveform::Sine, rate_hz)?;
    nodes.sources.push(lfo);
    let depth = ctx.create_gain(depth_hz)?;
    nodes.processors.push(depth);
    ctx.connect(lfo, Destination::Node(depth))?;
    ctx.connect(
        depth,
        Destination::Param(filter, lull_audio::Param::Frequency),
    )
}
