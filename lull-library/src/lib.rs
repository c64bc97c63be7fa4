//! Sound library for Lull - catalog, saved mixes, assets and configuration

mod assets;
mod catalog;
mod config;
mod mix;
mod store;

pub use assets::{AssetEvent, AssetFetcher};
pub use catalog::{
    asset_file_name, find_preset, find_sound, presets, sounds, sounds_in, Category,
    SoundDescriptor, Swell, Voice,
};
pub use config::{Config, SourceKind};
pub use mix::{now_millis, ActiveSounds, CategoryVolumes, SoundMix};
pub use store::{from_json, to_json, BlobStore, FileBlobStore, MemoryBlobStore, MixStore, StoreError};
