// crates/pointplay-core/src/commands.rs
//
// Every user action on the player is expressed as a PlayerCommand.
// Front ends emit these; the orchestrator feeds them to Machine::step.
// Adding a new action = add a variant here + one match arm in machine.rs.

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    // ── Source ───────────────────────────────────────────────────────────────
    /// Load a new video, replacing (and releasing) the current Session.
    /// Any in-flight inference request becomes stale.
    SetupVideo(String),
    /// Release the current Session and clear the point cloud. Returns the
    /// machine to `NoVideo` from any state.
    Reset,

    // ── Playback ─────────────────────────────────────────────────────────────
    Play,
    Pause,
    /// Seek to an absolute position in seconds.
    Seek(f64),
}

impl PlayerCommand {
    /// Short label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            PlayerCommand::SetupVideo(_) => "setup_video",
            PlayerCommand::Reset         => "reset",
            PlayerCommand::Play          => "play",
            PlayerCommand::Pause         => "pause",
            PlayerCommand::Seek(_)       => "seek",
        }
    }
}
