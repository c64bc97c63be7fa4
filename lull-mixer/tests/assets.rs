use lull_audio::SoftwareContext;
use lull_library::{asset_file_name, Category, MemoryBlobStore, MixStore};
use lull_mixer::{MixerController, Notice, Playback, SourceStrategy};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const RATE: u32 = 8000;

fn write_wav(dir: &Path, sound: &str) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let path = dir.join(asset_file_name(sound, "wav"));
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..RATE {
        let value = ((i as f32 * 0.1).sin() * 10000.0) as i16;
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

fn open_with_assets(
    dir: &TempDir,
) -> (
    MixerController<SoftwareContext>,
    crossbeam_channel::Receiver<Notice>,
) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mixer = MixerController::open(
        || Ok(SoftwareContext::new(RATE)),
        SourceStrategy::Assets {
            dir: dir.path().to_path_buf(),
            extension: "wav".to_string(),
        },
        MixStore::open(Box::new(MemoryBlobStore::new())),
        tx,
    );
    (mixer, rx)
}

#[test]
fn test_assets_arrive_and_missing_files_fail() {
    let dir = TempDir::new().unwrap();
    write_wav(dir.path(), "Rain");
    write_wav(dir.path(), "White Noise");

    let (mut mixer, rx) = open_with_assets(&dir);
    assert!(mixer.is_ready());
    assert_eq!(mixer.pending_assets(), 9);
    assert!(mixer.wait_for_assets(Duration::from_secs(10)));

    assert!(mixer.graph().contains("Rain"));
    assert!(mixer.graph().contains("White Noise"));
    assert_eq!(mixer.graph().len(), 2);
    assert_eq!(mixer.gain_of("Rain"), Some(0.0));

    let failures: Vec<_> = rx.try_iter().filter(|n| n.is_error()).collect();
    assert_eq!(failures.len(), 7);
    assert!(failures
        .iter()
        .any(|n| n.message == "Failed to create Piano sound"));
}

#[test]
fn test_asset_for_playing_sound_joins_at_level() {
    let dir = TempDir::new().unwrap();
    write_wav(dir.path(), "Rain");

    let (mut mixer, _rx) = open_with_assets(&dir);
    mixer.toggle_sound("Rain").unwrap();
    mixer.play().unwrap();
    mixer.wait_for_assets(Duration::from_secs(10));

    let gain = mixer.gain_of("Rain").unwrap();
    assert!((gain - 0.25).abs() < 1e-6);
    assert_eq!(mixer.now_playing(), vec!["Rain"]);
}

#[test]
fn test_loading_sound_keeps_playback_through_volume_change() {
    let dir = TempDir::new().unwrap();
    write_wav(dir.path(), "Rain");

    let (mut mixer, _rx) = open_with_assets(&dir);
    mixer.toggle_sound("Rain").unwrap();
    mixer.play().unwrap();
    assert!(mixer.graph().is_pending("Rain") || mixer.graph().contains("Rain"));
    mixer.set_category_volume(Category::Nature, 60).unwrap();
    assert_eq!(mixer.state().playback, Playback::Playing);

    assert!(mixer.wait_for_assets(Duration::from_secs(10)));
    assert!(!mixer.graph().is_pending("Rain"));
    assert_eq!(mixer.state().playback, Playback::Playing);
    let gain = mixer.gain_of("Rain").unwrap();
    assert!((gain - 0.3).abs() < 1e-6);
}

#[test]
fn test_assets_after_shutdown_are_dropped() {
    let dir = TempDir::new().unwrap();
    write_wav(dir.path(), "Rain");

    let (mut mixer, _rx) = open_with_assets(&dir);
    mixer.shutdown();

    assert_eq!(mixer.pending_assets(), 0);
    assert_eq!(mixer.poll(), 0);
    assert!(mixer.wait_for_assets(Duration::from_millis(50)));
    assert!(!mixer.graph().contains("Rain"));
    assert_eq!(mixer.gain_of("Rain"), None);
}
