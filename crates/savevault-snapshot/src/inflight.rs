use std::collections::HashSet;
use std::sync::Mutex;

/// Process-wide set of games with a backup in flight. A second backup
/// request for a busy game is answered with `None` immediately; there is
/// no queueing.
#[derive(Default)]
pub struct InflightBackups {
    inner: Mutex<HashSet<String>>,
}

impl InflightBackups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a game for backup. The claim is released when the returned
    /// guard drops, including on error paths.
    pub fn try_begin(&self, game_id: &str) -> Option<InflightGuard<'_>> {
        let mut set = self.inner.lock().expect("inflight set poisoned");
        if !set.insert(game_id.to_string()) {
            return None;
        }
        Some(InflightGuard {
            set: self,
            game_id: game_id.to_string(),
        })
    }

    pub fn is_busy(&self, game_id: &str) -> bool {
        self.inner
            .lock()
            .expect("inflight set poisoned")
            .contains(game_id)
    }
}

pub struct InflightGuard<'a> {
    set: &'a InflightBackups,
    game_id: String,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .inner
            .lock()
            .expect("inflight set poisoned")
            .remove(&self.game_id);
    }
}
