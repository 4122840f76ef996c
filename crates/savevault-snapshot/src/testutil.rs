use savevault_core::models::game::Game;
use savevault_index::LibraryIndex;
use tempfile::TempDir;

use crate::inflight::InflightBackups;

pub(crate) struct Fixture {
    pub dir: TempDir,
    pub index: LibraryIndex,
    pub inflight: InflightBackups,
    pub game: Game,
}

pub(crate) fn fixture(game_name: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut index = LibraryIndex::open(dir.path().join("data")).unwrap();
    let game = index
        .add_game(
            game_name,
            &dir.path().join("install/game.exe"),
            &dir.path().join("install"),
        )
        .unwrap();
    Fixture {
        dir,
        index,
        inflight: InflightBackups::new(),
        game,
    }
}
