// crates/pointplay-cli/src/script.rs
//
// Line-oriented control script read from stdin. One command per line;
// blank lines and `#` comments are skipped.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use pointplay_core::commands::PlayerCommand;

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Player(PlayerCommand),
    Status,
    /// Block before reading the next line.
    Wait(Duration),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  load <uri>     start a new video
  play | pause
  seek <secs>
  reset          unload and clear the point cloud
  status         print state, time and point count
  wait <secs>    sleep before the next line
  quit";

/// Parse one script line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<Line>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None         => (line, ""),
    };

    let parsed = match word.to_ascii_lowercase().as_str() {
        "load" | "open" => {
            if rest.is_empty() {
                bail!("load needs a source");
            }
            Line::Player(PlayerCommand::SetupVideo(rest.to_string()))
        }
        "play"           => Line::Player(PlayerCommand::Play),
        "pause"          => Line::Player(PlayerCommand::Pause),
        "reset"          => Line::Player(PlayerCommand::Reset),
        "seek"           => Line::Player(PlayerCommand::Seek(seconds(word, rest)?)),
        "wait" | "sleep" => Line::Wait(Duration::from_secs_f64(seconds(word, rest)?)),
        "status"         => Line::Status,
        "help" | "?"     => Line::Help,
        "quit" | "exit"  => Line::Quit,
        other            => bail!("unknown command `{other}` (try `help`)"),
    };
    Ok(Some(parsed))
}

fn seconds(word: &str, arg: &str) -> Result<f64> {
    let t: f64 = arg
        .parse()
        .map_err(|_| anyhow!("{word} needs a number of seconds, got `{arg}`"))?;
    if !t.is_finite() || t < 0.0 || Duration::try_from_secs_f64(t).is_err() {
        bail!("{word}: {t} is not a valid time");
    }
    Ok(t)
}
