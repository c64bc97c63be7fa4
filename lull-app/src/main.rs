//! Lull - ambient focus sound mixer
//!
//! Line-oriented front end: plays through the default output device and
//! reads commands from stdin.

mod commands;

use std::io::{self, BufRead, Write};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use commands::{Command, HELP};
use lull_audio::{AudioError, SharedContext, SoftwareContext};
use lull_library::{sounds, Category, Config, FileBlobStore, MixStore, SourceKind};
use lull_mixer::{DeletedMix, MixerController, MixerError, Notice, SourceStrategy};

type Mixer = MixerController<SharedContext>;

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "lull=info".parse() {
        filter = filter.add_directive(d);
    }
    if let Ok(d) = "lull_mixer=info".parse() {
        filter = filter.add_directive(d);
    }
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::load();
    debug!("Config: {:?}", config);

    let store = MixStore::open(Box::new(FileBlobStore::new(&config.data_dir)));
    let strategy = match config.source {
        SourceKind::Procedural => SourceStrategy::Procedural,
        SourceKind::Assets => SourceStrategy::Assets {
            dir: config.resolved_asset_dir(),
            extension: config.asset_extension.clone(),
        },
    };
    info!("Sound source: {}", config.source.name());

    let (notice_tx, notice_rx) = crossbeam_channel::unbounded();

    // Stream must outlive the mixer
    let mut stream = None;
    let mut mixer = MixerController::open(
        || start_output(&mut stream),
        strategy,
        store,
        notice_tx,
    );

    println!("Lull - type 'help' for commands");
    let result = run(&mut mixer, &notice_rx);

    mixer.shutdown();
    print_notices(&notice_rx);
    drop(mixer);
    drop(stream);

    result
}

/// Open the default output device and feed it from a fresh software context
fn start_output(slot: &mut Option<cpal::Stream>) -> Result<SharedContext, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::Unsupported("No audio output device found".into()))?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::Device(format!("Failed to get audio config: {}", e)))?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let context = SharedContext::new(SoftwareContext::new(sample_rate));
    let render = context.clone();

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render.render(data, channels);
            },
            |err| warn!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Device(format!("Failed to create audio stream: {}", e)))?;
    stream
        .play()
        .map_err(|e| AudioError::Device(format!("Failed to start audio: {}", e)))?;

    info!(
        "Output: {} ({} Hz, {} channels)",
        device.name().unwrap_or_else(|_| "unknown".into()),
        sample_rate,
        channels
    );
    *slot = Some(stream);
    Ok(context)
}

fn run(mixer: &mut Mixer, notices: &Receiver<Notice>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut last_deleted: Option<DeletedMix> = None;

    print_notices(notices);
    loop {
        print!("lull> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        mixer.poll();
        print_notices(notices);

        let Some(command) = commands::parse(&line) else {
            if !line.trim().is_empty() {
                println!("Unknown command, type 'help'");
            }
            continue;
        };
        if command == Command::Quit {
            break;
        }

        if let Err(e) = execute(mixer, command, &mut last_deleted) {
            match e {
                MixerError::UnknownSound(_)
                | MixerError::UnknownMix(_)
                | MixerError::AudioUnavailable => println!("{}", e),
                _ => debug!("Command failed: {}", e),
            }
        }
        print_notices(notices);
    }

    Ok(())
}

fn execute(
    mixer: &mut Mixer,
    command: Command,
    last_deleted: &mut Option<DeletedMix>,
) -> Result<(), MixerError> {
    match command {
        Command::Play => mixer.play()?,
        Command::Pause => mixer.pause()?,
        Command::TogglePlayback => mixer.toggle_playback()?,
        Command::Toggle(name) => {
            mixer.toggle_sound(resolve_sound(&name))?;
        }
        Command::Volume(category, percent) => {
            let stored = mixer.set_category_volume(category, percent)?;
            println!("{} volume: {}%", category, stored);
        }
        Command::Reset => mixer.reset()?,
        Command::Save(name) => {
            mixer.set_mix_name(name);
            let mix = mixer.save_mix()?;
            println!("Saved as {}", mix.id);
        }
        Command::Load(key) => {
            let id = resolve_mix(mixer, &key);
            mixer.load_mix_by_id(&id)?;
        }
        Command::Delete(id) => {
            *last_deleted = Some(mixer.delete_mix(&id)?);
        }
        Command::Undo => match last_deleted.take() {
            Some(deleted) => mixer.undo_delete(deleted)?,
            None => println!("Nothing to undo"),
        },
        Command::Sounds => print_sounds(mixer),
        Command::Mixes => print_mixes(mixer),
        Command::Status => print_status(mixer),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

/// Catalog name matching `name` case-insensitively, or `name` unchanged
fn resolve_sound(name: &str) -> &str {
    sounds()
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .map(|s| s.name)
        .unwrap_or(name)
}

/// Id of the saved mix or preset named `key`, or `key` itself
fn resolve_mix(mixer: &Mixer, key: &str) -> String {
    mixer
        .saved_mixes()
        .iter()
        .cloned()
        .chain(mixer.presets())
        .find(|m| m.id == key || m.name.eq_ignore_ascii_case(key))
        .map(|m| m.id)
        .unwrap_or_else(|| key.to_string())
}

fn print_notices(notices: &Receiver<Notice>) {
    for notice in notices.try_iter() {
        if notice.is_error() {
            println!("! {}", notice);
        } else {
            println!("* {}", notice);
        }
    }
}

fn print_sounds(mixer: &Mixer) {
    let state = mixer.state();
    for category in Category::ALL {
        println!("{} ({}%)", category, state.category_volume.get(category));
        for sound in lull_library::sounds_in(category) {
            let mark = if state.is_active(sound.name) { "x" } else { " " };
            let missing = if mixer.graph().contains(sound.name) {
                ""
            } else {
                "  (unavailable)"
            };
            println!("  [{}] {} {}{}", mark, sound.icon, sound.name, missing);
        }
    }
}

fn print_mixes(mixer: &Mixer) {
    println!("Presets:");
    for mix in mixer.presets() {
        println!("  {:<12} {}", mix.id, mix.name);
    }
    println!("Saved:");
    if mixer.saved_mixes().is_empty() {
        println!("  (none)");
    }
    for mix in mixer.saved_mixes() {
        println!("  {:<12} {} [{}]", mix.id, mix.name, mix.selected().collect::<Vec<_>>().join(", "));
    }
}

fn print_status(mixer: &Mixer) {
    let state = mixer.state();
    println!("Audio:    {:?}", state.readiness);
    println!("Playback: {:?}", state.playback);
    println!(
        "Volumes:  nature {}%, noise {}%, melody {}%",
        state.category_volume.nature, state.category_volume.noise, state.category_volume.melody
    );
    println!("Playing:  {}", mixer.now_playing().join(", "));
    if mixer.pending_assets() > 0 {
        println!("Loading:  {} sounds", mixer.pending_assets());
    }
    if let Some(error) = &state.last_error {
        println!("Last error: {}", error);
    }
}
