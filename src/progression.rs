// ============================================
// src/progression.rs
// レベルごとのベストスターと、レベル解放の判定
// ============================================

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::save_data::{KeyValueStore, read_json, write_json};
use crate::scoring::{MAX_STARS, RoundResult, stars_for};

/// 次のレベルを解放するのに必要なスター (前のレベルのベスト)
pub const CLEAR_STARS: u8 = 2;

const KEY_TOTAL_STARS: &str = "progress.total_stars";
const KEY_LEVELS: &str = "progress.levels";

/// 1レベル分の記録
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelRecord {
    /// ベストのスター (減らない)
    pub best_stars: u8,
    pub attempts: u32,
    /// ベストを取ったラウンドの正解率
    pub best_accuracy: f64,
    /// ベストを取ったラウンドの時間 (秒)
    pub best_time_secs: Option<f64>,
}

/// おすすめの次のレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextLevel {
    Play(u32),
    /// すべてのレベルでスターを取った
    AllComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressionStats {
    pub completed_levels: u32,
    pub total_stars: u32,
    pub max_unlocked_level: u32,
    /// 0.0〜1.0
    pub completion_fraction: f64,
    pub average_stars_per_completed_level: f64,
}

/// ベストが更新された時だけ、その差分を返す
pub fn star_delta(previous_best: u8, earned: u8) -> u32 {
    earned.saturating_sub(previous_best) as u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelProgressionTracker {
    total_levels: u32,
    records: BTreeMap<u32, LevelRecord>,
    total_stars: u32,
}

impl LevelProgressionTracker {
    pub fn new(catalog: &Catalog) -> Self {
        Self::with_total_levels(catalog.total_levels())
    }

    pub fn with_total_levels(total_levels: u32) -> Self {
        Self {
            total_levels,
            records: BTreeMap::new(),
            total_stars: 0,
        }
    }

    pub fn total_levels(&self) -> u32 {
        self.total_levels
    }

    pub fn total_stars(&self) -> u32 {
        self.total_stars
    }

    fn in_range(&self, level: u32) -> bool {
        (1..=self.total_levels).contains(&level)
    }

    pub fn best_stars(&self, level: u32) -> u8 {
        self.records.get(&level).map_or(0, |r| r.best_stars)
    }

    pub fn record(&self, level: u32) -> Option<&LevelRecord> {
        self.records.get(&level)
    }

    /// レベル1は常に遊べる。それ以外は前のレベルで2つ星以上
    pub fn is_unlocked(&self, level: u32) -> bool {
        if !self.in_range(level) {
            return false;
        }
        if level == 1 {
            return true;
        }
        self.best_stars(level - 1) >= CLEAR_STARS
    }

    pub fn max_unlocked_level(&self) -> u32 {
        (1..=self.total_levels)
            .filter(|&level| self.is_unlocked(level))
            .max()
            .unwrap_or(1)
    }

    /// クリアを記録する。増えた合計スターを返す
    ///
    /// 範囲外・未解放のレベルは無視する。スターは 0〜3 に丸める。
    pub fn record_completion(&mut self, level: u32, earned_stars: i32) -> u32 {
        if !self.in_range(level) {
            warn!("ignoring completion for out-of-range level {}", level);
            return 0;
        }
        if !self.is_unlocked(level) {
            warn!("ignoring completion for locked level {}", level);
            return 0;
        }

        let earned = earned_stars.clamp(0, MAX_STARS as i32) as u8;
        let record = self.records.entry(level).or_default();
        record.attempts += 1;

        let delta = star_delta(record.best_stars, earned);
        if delta > 0 {
            record.best_stars = earned;
            self.total_stars += delta;
            info!(
                "level {} best is now {} stars (total {})",
                level, earned, self.total_stars
            );
        } else {
            debug!("level {} replayed with {} stars, best unchanged", level, earned);
        }
        delta
    }

    /// ラウンドの結果からスターを計算して記録する
    ///
    /// 記録できなかった時 (未解放など) は None。
    pub fn record_round(&mut self, level: u32, result: &RoundResult) -> Option<u8> {
        if !self.is_unlocked(level) {
            warn!("ignoring round for unavailable level {}", level);
            return None;
        }

        let stars = stars_for(result.correct, result.total, result.elapsed_secs);
        let delta = self.record_completion(level, stars as i32);

        // 正解率と時間はスターが増えた時 (と初回) だけ書き換える
        let record = self.records.entry(level).or_default();
        if delta > 0 || record.attempts == 1 {
            record.best_accuracy = result.accuracy();
            if result.is_timed() {
                record.best_time_secs = Some(result.elapsed_secs);
            }
        }
        Some(stars)
    }

    /// まだスターのない、遊べるレベルのうち一番小さいもの
    pub fn recommended_next_level(&self) -> NextLevel {
        if let Some(level) =
            (1..=self.total_levels).find(|&l| self.is_unlocked(l) && self.best_stars(l) == 0)
        {
            return NextLevel::Play(level);
        }

        if (1..=self.total_levels).all(|l| self.best_stars(l) > 0) {
            return NextLevel::AllComplete;
        }

        // まだ開いていないレベルがある: 開けるために今の最後のレベルをやり直す
        NextLevel::Play(self.max_unlocked_level())
    }

    pub fn stats(&self) -> ProgressionStats {
        let completed_levels = self.records.values().filter(|r| r.best_stars > 0).count() as u32;
        let average = if completed_levels > 0 {
            self.total_stars as f64 / completed_levels as f64
        } else {
            0.0
        };
        let completion_fraction = if self.total_levels > 0 {
            completed_levels as f64 / self.total_levels as f64
        } else {
            0.0
        };

        ProgressionStats {
            completed_levels,
            total_stars: self.total_stars,
            max_unlocked_level: self.max_unlocked_level(),
            completion_fraction,
            average_stars_per_completed_level: average,
        }
    }

    /// 進行データをリセット (レベル1だけ解放された状態)
    pub fn reset(&mut self) {
        self.records.clear();
        self.total_stars = 0;
        info!("level progress reset");
    }

    // MARK: 保存と読み込み

    pub fn load(catalog: &Catalog, store: &dyn KeyValueStore) -> Self {
        let mut tracker = Self::new(catalog);
        let records: BTreeMap<u32, LevelRecord> = read_json(store, KEY_LEVELS).unwrap_or_default();

        for (level, mut record) in records {
            if !tracker.in_range(level) {
                warn!("dropping saved record for unknown level {}", level);
                continue;
            }
            record.best_stars = record.best_stars.min(MAX_STARS);
            tracker.total_stars += record.best_stars as u32;
            tracker.records.insert(level, record);
        }

        // 合計は各レベルのベストの和から作り直す
        if let Some(saved) = read_json::<u32>(store, KEY_TOTAL_STARS) {
            if saved != tracker.total_stars {
                warn!(
                    "saved total stars {} disagrees with level records ({}), using records",
                    saved, tracker.total_stars
                );
            }
        }
        tracker
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) {
        write_json(store, KEY_TOTAL_STARS, &self.total_stars);
        write_json(store, KEY_LEVELS, &self.records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save_data::MemoryStore;

    fn tracker() -> LevelProgressionTracker {
        LevelProgressionTracker::new(&Catalog::standard())
    }

    #[test]
    fn fresh_tracker_only_opens_level_one() {
        let t = tracker();
        assert!(t.is_unlocked(1));
        assert!(!t.is_unlocked(2));
        assert!(!t.is_unlocked(0));
        assert!(!t.is_unlocked(11));
        assert_eq!(t.recommended_next_level(), NextLevel::Play(1));
        assert_eq!(t.max_unlocked_level(), 1);
    }

    #[test]
    fn three_stars_on_level_one_opens_level_two_only() {
        let mut t = tracker();
        assert_eq!(t.record_completion(1, 3), 3);
        assert_eq!(t.total_stars(), 3);
        assert_eq!(t.best_stars(1), 3);
        assert!(t.is_unlocked(2));
        assert!(!t.is_unlocked(3));
        assert_eq!(t.recommended_next_level(), NextLevel::Play(2));
    }

    #[test]
    fn unlock_requires_two_stars_on_previous_level() {
        let mut t = tracker();
        t.record_completion(1, 1);
        assert!(!t.is_unlocked(2));
        t.record_completion(1, 2);
        assert!(t.is_unlocked(2));

        // 1:3 2:2 3:1 (4はまだ閉じているので記録されない)
        t.record_completion(1, 3);
        t.record_completion(2, 2);
        t.record_completion(3, 1);
        t.record_completion(4, 3);
        assert_eq!(t.best_stars(3), 1);
        assert_eq!(t.best_stars(4), 0);

        assert!(t.is_unlocked(3), "2 stars on level 2 opens level 3");
        assert!(!t.is_unlocked(4), "1 star on level 3 keeps level 4 closed");
        assert!(!t.is_unlocked(5));
        for k in 2..=10 {
            assert_eq!(t.is_unlocked(k), t.best_stars(k - 1) >= 2, "level {k}");
        }

        // 3を2つ星にすると4が開く
        t.record_completion(3, 2);
        assert!(t.is_unlocked(4));
        t.record_completion(4, 1);
        assert!(!t.is_unlocked(5));
        for k in 2..=10 {
            assert_eq!(t.is_unlocked(k), t.best_stars(k - 1) >= 2, "level {k}");
        }
    }

    #[test]
    fn replays_only_add_the_improvement() {
        let mut t = tracker();
        t.record_completion(1, 2);
        assert_eq!(t.record_completion(1, 2), 0);
        assert_eq!(t.record_completion(1, 1), 0);
        assert_eq!(t.total_stars(), 2);

        assert_eq!(t.record_completion(1, 3), 1);
        assert_eq!(t.total_stars(), 3);
        assert_eq!(t.record(1).unwrap().attempts, 4);
    }

    #[test]
    fn star_delta_is_never_negative() {
        assert_eq!(star_delta(0, 3), 3);
        assert_eq!(star_delta(2, 3), 1);
        assert_eq!(star_delta(3, 1), 0);
        assert_eq!(star_delta(2, 2), 0);
    }

    #[test]
    fn bad_input_is_ignored_or_clamped() {
        let mut t = tracker();
        assert_eq!(t.record_completion(0, 3), 0);
        assert_eq!(t.record_completion(11, 3), 0);
        assert_eq!(t.record_completion(2, 3), 0);
        assert_eq!(t.record_completion(1, -4), 0);
        assert_eq!(t.record_completion(1, 99), 3);
        assert_eq!(t.best_stars(1), 3);
        assert!(t.record(2).is_none());
    }

    #[test]
    fn record_round_scores_and_keeps_bests() {
        let mut t = tracker();
        assert_eq!(t.record_round(1, &RoundResult::new(3, 5, 60.0)), Some(1));
        assert_eq!(t.record_round(1, &RoundResult::new(5, 5, 10.0)), Some(3));
        assert_eq!(t.record_round(1, &RoundResult::new(4, 5, 50.0)), Some(2));

        let record = t.record(1).unwrap();
        assert_eq!(record.best_stars, 3);
        assert_eq!(record.best_accuracy, 1.0);
        assert_eq!(record.best_time_secs, Some(10.0));
        assert_eq!(record.attempts, 3);
        assert_eq!(t.record_round(3, &RoundResult::new(5, 5, 10.0)), None);
    }

    #[test]
    fn failed_replay_keeps_the_best_round() {
        let mut t = tracker();
        t.record_round(1, &RoundResult::new(5, 5, 60.0));
        let before = t.record(1).unwrap().clone();

        // 速いけど全部まちがい
        assert_eq!(t.record_round(1, &RoundResult::new(0, 5, 1.0)), Some(0));
        let after = t.record(1).unwrap();
        assert_eq!(after.best_stars, before.best_stars);
        assert_eq!(after.best_accuracy, 1.0);
        assert_eq!(after.best_time_secs, Some(60.0));
        assert_eq!(after.attempts, 2);
    }

    #[test]
    fn first_round_is_recorded_even_without_stars() {
        let mut t = tracker();
        assert_eq!(t.record_round(1, &RoundResult::new(1, 5, 40.0)), Some(0));
        let record = t.record(1).unwrap();
        assert_eq!(record.best_accuracy, 0.2);
        assert_eq!(record.best_time_secs, Some(40.0));

        // 計れなかった時間は記録しない
        let mut t = tracker();
        t.record_round(1, &RoundResult::new(5, 5, f64::NAN));
        assert_eq!(t.record(1).unwrap().best_time_secs, None);
    }

    #[test]
    fn recommendation_when_stuck_or_done() {
        let mut t = tracker();
        t.record_completion(1, 1);
        // レベル1はスターありだが、レベル2はまだ開いていない
        assert_eq!(t.recommended_next_level(), NextLevel::Play(1));

        for level in 1..=10 {
            t.record_completion(level, 3);
        }
        assert_eq!(t.recommended_next_level(), NextLevel::AllComplete);
    }

    #[test]
    fn stats_summary() {
        let mut t = tracker();
        t.record_completion(1, 3);
        t.record_completion(2, 2);
        let stats = t.stats();
        assert_eq!(stats.completed_levels, 2);
        assert_eq!(stats.total_stars, 5);
        assert_eq!(stats.max_unlocked_level, 3);
        assert_eq!(stats.completion_fraction, 0.2);
        assert_eq!(stats.average_stars_per_completed_level, 2.5);

        t.reset();
        assert_eq!(t.stats().total_stars, 0);
        assert_eq!(t.stats().average_stars_per_completed_level, 0.0);
    }

    #[test]
    fn save_and_load_rebuilds_total_from_records() {
        let catalog = Catalog::standard();
        let mut t = LevelProgressionTracker::new(&catalog);
        t.record_completion(1, 3);
        t.record_completion(2, 2);

        let mut kv = MemoryStore::new();
        t.save(&mut kv);
        let loaded = LevelProgressionTracker::load(&catalog, &kv);
        assert_eq!(loaded, t);

        kv.set("progress.total_stars", "99".to_string());
        assert_eq!(LevelProgressionTracker::load(&catalog, &kv).total_stars(), 5);

        let fresh = LevelProgressionTracker::load(&catalog, &MemoryStore::new());
        assert_eq!(fresh.total_stars(), 0);
    }
}
