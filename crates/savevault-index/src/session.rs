use savevault_core::models::game::Game;

/// Capability for asking whether a game's process is currently running.
/// The session monitor collaborator implements this; the core only reads.
pub trait SessionProbe {
    fn is_running(&self, game: &Game) -> bool;
}

/// Default probe for contexts without a session monitor.
pub struct NoopSessionProbe;

impl SessionProbe for NoopSessionProbe {
    fn is_running(&self, _game: &Game) -> bool {
        false
    }
}
