//! Command definitions for Lull

use lull_library::Category;

/// Commands typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Playback
    Play,
    Pause,
    TogglePlayback,

    // Selection
    Toggle(String),
    Volume(Category, i32),
    Reset,

    // Mixes
    Save(String),
    Load(String),
    Delete(String),
    Undo,

    // Listing
    Sounds,
    Mixes,
    Status,
    Help,

    Quit,
}

/// Parse one input line; `None` if it is not a command
pub fn parse(line: &str) -> Option<Command> {
    let input = line.trim();
    let (word, rest) = match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, unquote(rest.trim())),
        None => (input, ""),
    };

    match (word.to_ascii_lowercase().as_str(), rest) {
        ("play", "") => Some(Command::Play),
        ("pause", "") | ("stop", "") => Some(Command::Pause),
        ("p", "") | ("space", "") => Some(Command::TogglePlayback),
        ("reset", "") => Some(Command::Reset),
        ("undo", "") => Some(Command::Undo),
        ("sounds", "") | ("ls", "") => Some(Command::Sounds),
        ("mixes", "") => Some(Command::Mixes),
        ("status", "") => Some(Command::Status),
        ("help", "") | ("?", "") => Some(Command::Help),
        ("q", "") | ("quit", "") | ("exit", "") => Some(Command::Quit),

        ("toggle", sound) | ("t", sound) if !sound.is_empty() => {
            Some(Command::Toggle(sound.to_string()))
        }
        ("volume", args) | ("vol", args) => parse_volume(args),
        ("save", name) if !name.is_empty() => Some(Command::Save(name.to_string())),
        ("load", id) if !id.is_empty() => Some(Command::Load(id.to_string())),
        ("delete", id) | ("rm", id) if !id.is_empty() => Some(Command::Delete(id.to_string())),

        _ => None,
    }
}

fn parse_volume(args: &str) -> Option<Command> {
    let mut parts = args.split_whitespace();
    let category = Category::from_name(parts.next()?)?;
    let percent = parts.next()?.trim_end_matches('%').parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Command::Volume(category, percent))
}

/// Remove surrounding quotes if present
fn unquote(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

pub const HELP: &str = "\
Commands:
  play | pause | p            start, stop or flip playback
  toggle <sound>              add or remove a sound
  volume <category> <0-100>   nature, noise or melody
  reset                       defaults, nothing selected
  save <name>                 save the current mix
  load <id|name>              load a saved mix or preset
  delete <id>                 delete a saved mix
  undo                        restore the last deleted mix
  sounds | mixes | status     list things
  quit";
