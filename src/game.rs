// ============================================
// src/game.rs
// カタログ・設定・進行・解放をまとめて、保存のタイミングを決める
// ============================================

use log::{info, warn};
use rand::Rng;

use crate::catalog::Catalog;
use crate::progression::{LevelProgressionTracker, NextLevel};
use crate::save_data::{KeyValueStore, flush};
use crate::scoring::{GameStats, RoundResult, game_stats};
use crate::session::GameSession;
use crate::settings::{SettingField, SettingsStore};
use crate::unlock::{UnlockEvent, UnlockTracker};

/// ラウンド終了後のまとめ
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub level: u32,
    pub stats: GameStats,
    /// 合計スターが増えた分
    pub stars_gained: u32,
    pub events: Vec<UnlockEvent>,
    pub next: NextLevel,
}

/// ゲーム全体 (保存先は差し替えできる)
#[derive(Debug)]
pub struct HiraganaGame<S: KeyValueStore> {
    catalog: Catalog,
    settings: SettingsStore,
    progression: LevelProgressionTracker,
    unlocks: UnlockTracker,
    store: S,
}

impl<S: KeyValueStore> HiraganaGame<S> {
    /// 保存先から状態を読み込む。無いものは新規インストールの状態
    pub fn open(store: S) -> Self {
        let catalog = Catalog::standard();
        let settings = SettingsStore::load(&store);
        let progression = LevelProgressionTracker::load(&catalog, &store);
        let unlocks = UnlockTracker::load(&catalog, &store);
        Self {
            catalog,
            settings,
            progression,
            unlocks,
            store,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn progression(&self) -> &LevelProgressionTracker {
        &self.progression
    }

    pub fn unlocks(&self) -> &UnlockTracker {
        &self.unlocks
    }

    /// 解放通知の購読用
    pub fn unlocks_mut(&mut self) -> &mut UnlockTracker {
        &mut self.unlocks
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 遊べるレベルならラウンドを始める
    pub fn start_round<R: Rng + ?Sized>(&self, level: u32, rng: &mut R) -> Option<GameSession> {
        if !self.progression.is_unlocked(level) {
            warn!("level {} is not unlocked yet", level);
            return None;
        }
        GameSession::start(&self.catalog, level, self.settings.settings().difficulty, rng)
    }

    /// ラウンドの結果を記録して保存する
    pub fn finish_round(&mut self, level: u32, result: &RoundResult) -> Option<RoundReport> {
        let before = self.progression.total_stars();
        let stars = self.progression.record_round(level, result)?;
        let events = self.unlocks.record_level_completion(
            level,
            stars as i32,
            result.accuracy(),
            result.elapsed_secs,
        );
        let stars_gained = self.progression.total_stars() - before;

        self.progression.save(&mut self.store);
        self.unlocks.save(&mut self.store);
        flush(&mut self.store);

        info!(
            "level {} finished: {}/{} correct, {} stars",
            level, result.correct, result.total, stars
        );
        Some(RoundReport {
            level,
            stats: game_stats(result),
            stars_gained,
            events,
            next: self.progression.recommended_next_level(),
        })
    }

    /// 設定を変えて、その項目を保存する
    pub fn change_setting(&mut self, change: impl FnOnce(&mut SettingsStore) -> SettingField) -> SettingField {
        let field = change(&mut self.settings);
        self.settings.save_field(&mut self.store, field);
        flush(&mut self.store);
        field
    }

    /// 進行データを最初からにする (設定はそのまま)
    pub fn reset_progress(&mut self) {
        self.progression.reset();
        self.unlocks.reset();
        self.progression.save(&mut self.store);
        self.unlocks.save(&mut self.store);
        flush(&mut self.store);
    }
}
