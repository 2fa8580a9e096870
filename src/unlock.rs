// ============================================
// src/unlock.rs
// 合計スターによる文字の解放と、実績 (アチーブメント)
// ============================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, KANA_ROWS};
use crate::progression::star_delta;
use crate::save_data::{KeyValueStore, read_json, write_json};
use crate::scoring::MAX_STARS;

/// 解放した文字数がこれ以上でコレクター
pub const COLLECTOR_THRESHOLD: usize = 30;
/// 連続クリアがこれ以上で連続チャンピオン
pub const STREAK_THRESHOLD: u32 = 5;
/// 1問あたりの平均秒数がこれ以下でスピードマスター
pub const SPEED_RUN_SECONDS: f64 = 5.0;

const KEY_TOTAL_STARS: &str = "unlock.total_stars";
const KEY_CHARACTERS: &str = "unlock.characters";
const KEY_ACHIEVEMENTS: &str = "unlock.achievements";
const KEY_LEVEL_STATS: &str = "unlock.level_stats";
const KEY_OVERALL: &str = "unlock.overall";

/// 合計スターで解放される文字のまとまり
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardGroup {
    pub name: &'static str,
    pub threshold: u32,
    pub symbols: &'static [&'static str],
}

/// しきい値の小さい順
pub const REWARD_GROUPS: &[RewardGroup] = &[
    RewardGroup { name: KANA_ROWS[0].0, threshold: 0, symbols: KANA_ROWS[0].1 },
    RewardGroup { name: KANA_ROWS[1].0, threshold: 1, symbols: KANA_ROWS[1].1 },
    RewardGroup { name: KANA_ROWS[2].0, threshold: 3, symbols: KANA_ROWS[2].1 },
    RewardGroup { name: KANA_ROWS[3].0, threshold: 6, symbols: KANA_ROWS[3].1 },
    RewardGroup { name: KANA_ROWS[4].0, threshold: 10, symbols: KANA_ROWS[4].1 },
    RewardGroup { name: KANA_ROWS[5].0, threshold: 15, symbols: KANA_ROWS[5].1 },
    RewardGroup { name: KANA_ROWS[6].0, threshold: 21, symbols: KANA_ROWS[6].1 },
    RewardGroup { name: KANA_ROWS[7].0, threshold: 28, symbols: KANA_ROWS[7].1 },
    RewardGroup { name: KANA_ROWS[8].0, threshold: 36, symbols: KANA_ROWS[8].1 },
    RewardGroup { name: KANA_ROWS[9].0, threshold: 45, symbols: KANA_ROWS[9].1 },
];

/// 実績
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstCompletion,
    PerfectScore,
    SpeedRun,
    Streak,
    Collector,
    Master,
}

impl Achievement {
    pub const ALL: [Achievement; 6] = [
        Achievement::FirstCompletion,
        Achievement::PerfectScore,
        Achievement::SpeedRun,
        Achievement::Streak,
        Achievement::Collector,
        Achievement::Master,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Achievement::FirstCompletion => "初回クリア",
            Achievement::PerfectScore => "パーフェクト",
            Achievement::SpeedRun => "スピードマスター",
            Achievement::Streak => "連続チャンピオン",
            Achievement::Collector => "コレクター",
            Achievement::Master => "ひらがなマスター",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Achievement::FirstCompletion => "初めてレベルをクリア！",
            Achievement::PerfectScore => "100%の正解率を達成！",
            Achievement::SpeedRun => "素早くクリア！",
            Achievement::Streak => "連続でレベルクリア！",
            Achievement::Collector => "たくさんのキャラクターを解放！",
            Achievement::Master => "全てのひらがなをマスター！",
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// 画面側へ知らせる出来事
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockEvent {
    /// 1回の判定で新しく解放された文字 (まとめて1回)
    CharactersUnlocked(Vec<String>),
    AchievementUnlocked(Achievement),
}

/// 特別な解放条件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecialRequirement {
    AllLevelsCompleted,
    Streak(u32),
    TotalStars(u32),
    /// どこかのレベルをこの秒数以内でクリア
    TimeRecord(f64),
}

/// レベルごとの統計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStatistics {
    pub level: u32,
    pub best_stars: u8,
    pub best_accuracy: f64,
    pub best_time_secs: Option<f64>,
    pub attempts: u32,
    pub average_stars: f64,
    pub last_played: DateTime<Utc>,
}

/// 全体の統計 (保存用)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverallStatistics {
    pub total_time_played: f64,
    pub accuracy_sum: f64,
    pub completions: u32,
    pub current_streak: u32,
    pub highest_streak: u32,
}

impl OverallStatistics {
    /// 全プレイの正解率の単純平均
    pub fn average_accuracy(&self) -> f64 {
        if self.completions == 0 {
            return 0.0;
        }
        self.accuracy_sum / self.completions as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StarStatistics {
    pub total_stars: u32,
    pub levels_completed: u32,
    pub average_stars_per_level: f64,
    pub total_time_played: f64,
    pub average_accuracy: f64,
    pub current_streak: u32,
    pub highest_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockProgress {
    pub unlocked_count: usize,
    pub total_count: usize,
    pub fraction: f64,
    pub current_group: &'static str,
    pub next_group: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextUnlockInfo {
    /// あと何スターで解放されるか
    pub stars_needed: u32,
    pub group_name: &'static str,
    pub characters: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct UnlockedAchievement {
    achievement: Achievement,
    unlocked_at: DateTime<Utc>,
}

/// 1回のクリアの情報 (実績判定用)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundFacts {
    pub stars: u8,
    pub accuracy: f64,
    pub average_secs: f64,
}

/// 実績判定に使う状態のスナップショット
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AchievementContext {
    pub completed_levels: u32,
    pub total_levels: u32,
    pub current_streak: u32,
    pub unlocked_characters: usize,
    /// クリア直後の判定なら Some
    pub round: Option<RoundFacts>,
}

// MARK: 判定 (純粋関数)

/// 今の合計スターで新しく解放される文字 (グループ順)
pub fn newly_unlocked(unlocked: &BTreeSet<String>, total_stars: u32) -> Vec<&'static str> {
    REWARD_GROUPS
        .iter()
        .filter(|group| total_stars >= group.threshold)
        .flat_map(|group| group.symbols.iter().copied())
        .filter(|symbol| !unlocked.contains(*symbol))
        .collect()
}

/// 条件を満たしていて、まだ持っていない実績
pub fn check_achievements(
    ctx: &AchievementContext,
    unlocked: &BTreeSet<Achievement>,
) -> Vec<Achievement> {
    let mut earned = Vec::new();

    if let Some(round) = ctx.round {
        if ctx.completed_levels >= 1 {
            earned.push(Achievement::FirstCompletion);
        }
        if round.accuracy >= 1.0 {
            earned.push(Achievement::PerfectScore);
        }
        if round.stars > 0 && round.average_secs <= SPEED_RUN_SECONDS {
            earned.push(Achievement::SpeedRun);
        }
        if ctx.current_streak >= STREAK_THRESHOLD {
            earned.push(Achievement::Streak);
        }
    }
    if ctx.unlocked_characters >= COLLECTOR_THRESHOLD {
        earned.push(Achievement::Collector);
    }
    if ctx.total_levels > 0 && ctx.completed_levels >= ctx.total_levels {
        earned.push(Achievement::Master);
    }

    earned.retain(|a| !unlocked.contains(a));
    earned
}

type Listener = Box<dyn FnMut(&UnlockEvent)>;

/// 合計スター・解放済みの文字・実績を管理する
pub struct UnlockTracker {
    total_levels: u32,
    question_counts: BTreeMap<u32, usize>,
    total_stars: u32,
    unlocked_characters: BTreeSet<String>,
    achievements: BTreeMap<Achievement, DateTime<Utc>>,
    level_stats: BTreeMap<u32, LevelStatistics>,
    overall: OverallStatistics,
    listeners: Vec<Listener>,
}

impl fmt::Debug for UnlockTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockTracker")
            .field("total_stars", &self.total_stars)
            .field("unlocked_characters", &self.unlocked_characters)
            .field("achievements", &self.achievements)
            .field("overall", &self.overall)
            .finish_non_exhaustive()
    }
}

fn default_characters() -> BTreeSet<String> {
    REWARD_GROUPS[0].symbols.iter().map(|s| s.to_string()).collect()
}

impl UnlockTracker {
    /// 新規状態 (あ行だけ解放済み)
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            total_levels: catalog.total_levels(),
            question_counts: catalog
                .levels()
                .iter()
                .map(|def| (def.number, def.question_count))
                .collect(),
            total_stars: 0,
            unlocked_characters: default_characters(),
            achievements: BTreeMap::new(),
            level_stats: BTreeMap::new(),
            overall: OverallStatistics::default(),
            listeners: Vec::new(),
        }
    }

    /// 解放・実績の通知を受け取る
    pub fn subscribe(&mut self, listener: impl FnMut(&UnlockEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: UnlockEvent) -> UnlockEvent {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
        event
    }

    pub fn total_stars(&self) -> u32 {
        self.total_stars
    }

    pub fn add_stars(&mut self, stars: u32) {
        self.total_stars = self.total_stars.saturating_add(stars);
        debug!("total stars now {}", self.total_stars);
    }

    pub fn is_character_unlocked(&self, symbol: &str) -> bool {
        self.unlocked_characters.contains(symbol)
    }

    pub fn unlocked_characters(&self) -> Vec<&str> {
        self.unlocked_characters.iter().map(String::as_str).collect()
    }

    pub fn has_achievement(&self, achievement: Achievement) -> bool {
        self.achievements.contains_key(&achievement)
    }

    /// 持っている実績と、その日時
    pub fn achievements(&self) -> impl Iterator<Item = (Achievement, DateTime<Utc>)> + '_ {
        self.achievements.iter().map(|(a, at)| (*a, *at))
    }

    pub fn level_statistics(&self, level: u32) -> Option<&LevelStatistics> {
        self.level_stats.get(&level)
    }

    fn completed_levels(&self) -> u32 {
        self.level_stats.values().filter(|s| s.best_stars > 0).count() as u32
    }

    fn context(&self, round: Option<RoundFacts>) -> AchievementContext {
        AchievementContext {
            completed_levels: self.completed_levels(),
            total_levels: self.total_levels,
            current_streak: self.overall.current_streak,
            unlocked_characters: self.unlocked_characters.len(),
            round,
        }
    }

    fn award(&mut self, round: Option<RoundFacts>) -> Vec<UnlockEvent> {
        let owned: BTreeSet<Achievement> = self.achievements.keys().copied().collect();
        let earned = check_achievements(&self.context(round), &owned);

        let mut events = Vec::with_capacity(earned.len());
        for achievement in earned {
            info!("achievement unlocked: {}", achievement);
            self.achievements.insert(achievement, Utc::now());
            events.push(self.emit(UnlockEvent::AchievementUnlocked(achievement)));
        }
        events
    }

    /// しきい値を見直し、新しく解放した文字をまとめて通知する
    pub fn refresh_unlocks(&mut self) -> Vec<UnlockEvent> {
        let fresh: Vec<String> = newly_unlocked(&self.unlocked_characters, self.total_stars)
            .into_iter()
            .map(str::to_string)
            .collect();
        if fresh.is_empty() {
            return Vec::new();
        }

        info!("unlocked {} characters: {}", fresh.len(), fresh.join(""));
        self.unlocked_characters.extend(fresh.iter().cloned());

        let mut events = vec![self.emit(UnlockEvent::CharactersUnlocked(fresh))];
        events.extend(self.award(None));
        events
    }

    /// レベルのクリアを記録する
    ///
    /// スターはベストを超えた分だけ合計に足す。連続記録を更新してから実績を判定する。
    pub fn record_level_completion(
        &mut self,
        level: u32,
        stars: i32,
        accuracy: f64,
        elapsed_secs: f64,
    ) -> Vec<UnlockEvent> {
        if !(1..=self.total_levels).contains(&level) {
            warn!("ignoring completion for unknown level {}", level);
            return Vec::new();
        }
        let stars = stars.clamp(0, MAX_STARS as i32) as u8;
        let accuracy = if accuracy.is_nan() { 0.0 } else { accuracy.clamp(0.0, 1.0) };
        // 計れなかった時間は統計に入れない
        let elapsed_secs = if elapsed_secs.is_finite() {
            Some(elapsed_secs.max(0.0))
        } else {
            warn!("level {} finished without a usable time", level);
            None
        };
        let now = Utc::now();

        let mut events = Vec::new();

        // スター
        let previous_best = self.level_stats.get(&level).map_or(0, |s| s.best_stars);
        let delta = star_delta(previous_best, stars);
        if delta > 0 {
            self.add_stars(delta);
            events.extend(self.refresh_unlocks());
        }

        // レベル統計
        match self.level_stats.get_mut(&level) {
            Some(existing) => {
                let attempts = existing.attempts + 1;
                existing.average_stars =
                    (existing.average_stars * existing.attempts as f64 + stars as f64) / attempts as f64;
                existing.attempts = attempts;
                existing.best_stars = existing.best_stars.max(stars);
                existing.best_accuracy = existing.best_accuracy.max(accuracy);
                existing.best_time_secs = match (existing.best_time_secs, elapsed_secs) {
                    (Some(best), Some(secs)) => Some(best.min(secs)),
                    (best, secs) => best.or(secs),
                };
                existing.last_played = now;
            }
            None => {
                self.level_stats.insert(
                    level,
                    LevelStatistics {
                        level,
                        best_stars: stars,
                        best_accuracy: accuracy,
                        best_time_secs: elapsed_secs,
                        attempts: 1,
                        average_stars: stars as f64,
                        last_played: now,
                    },
                );
            }
        }

        // 全体統計と連続記録
        self.overall.total_time_played += elapsed_secs.unwrap_or(0.0);
        self.overall.accuracy_sum += accuracy;
        self.overall.completions += 1;
        if stars > 0 {
            self.overall.current_streak += 1;
            self.overall.highest_streak = self.overall.highest_streak.max(self.overall.current_streak);
        } else {
            self.overall.current_streak = 0;
        }

        let questions = self.question_counts.get(&level).copied().unwrap_or(1).max(1);
        let round = RoundFacts {
            stars,
            accuracy,
            average_secs: elapsed_secs.map_or(f64::INFINITY, |secs| secs / questions as f64),
        };
        events.extend(self.award(Some(round)));
        events
    }

    /// 条件つきで特別に1文字解放する
    pub fn unlock_special(&mut self, symbol: &str, requirement: SpecialRequirement) -> Option<UnlockEvent> {
        let satisfied = match requirement {
            SpecialRequirement::AllLevelsCompleted => self.completed_levels() >= self.total_levels,
            SpecialRequirement::Streak(count) => self.overall.highest_streak >= count,
            SpecialRequirement::TotalStars(count) => self.total_stars >= count,
            SpecialRequirement::TimeRecord(seconds) => self
                .level_stats
                .values()
                .any(|s| s.best_stars > 0 && s.best_time_secs.is_some_and(|t| t <= seconds)),
        };
        if !satisfied || self.unlocked_characters.contains(symbol) {
            return None;
        }

        info!("special unlock: {}", symbol);
        self.unlocked_characters.insert(symbol.to_string());
        Some(self.emit(UnlockEvent::CharactersUnlocked(vec![symbol.to_string()])))
    }

    // MARK: 表示用の集計

    pub fn star_statistics(&self) -> StarStatistics {
        let levels_completed = self.completed_levels();
        let average = if levels_completed > 0 {
            self.total_stars as f64 / levels_completed as f64
        } else {
            0.0
        };
        StarStatistics {
            total_stars: self.total_stars,
            levels_completed,
            average_stars_per_level: average,
            total_time_played: self.overall.total_time_played,
            average_accuracy: self.overall.average_accuracy(),
            current_streak: self.overall.current_streak,
            highest_streak: self.overall.highest_streak,
        }
    }

    pub fn unlock_progress(&self) -> UnlockProgress {
        let total_count: usize = REWARD_GROUPS.iter().map(|g| g.symbols.len()).sum();
        let unlocked_count = self.unlocked_characters.len();
        let current_group = REWARD_GROUPS
            .iter()
            .rev()
            .find(|g| self.total_stars >= g.threshold)
            .map_or(REWARD_GROUPS[0].name, |g| g.name);

        UnlockProgress {
            unlocked_count,
            total_count,
            fraction: unlocked_count as f64 / total_count as f64,
            current_group,
            next_group: self.next_unlock().map(|info| info.group_name),
        }
    }

    /// 次に解放されるグループ (全部解放済みなら None)
    pub fn next_unlock(&self) -> Option<NextUnlockInfo> {
        REWARD_GROUPS
            .iter()
            .find(|g| self.total_stars < g.threshold)
            .map(|g| NextUnlockInfo {
                stars_needed: g.threshold - self.total_stars,
                group_name: g.name,
                characters: g.symbols,
            })
    }

    pub fn reset(&mut self) {
        self.total_stars = 0;
        self.unlocked_characters = default_characters();
        self.achievements.clear();
        self.level_stats.clear();
        self.overall = OverallStatistics::default();
        info!("unlock progress reset");
    }

    // MARK: 保存と読み込み

    pub fn load(catalog: &Catalog, store: &dyn KeyValueStore) -> Self {
        let mut tracker = Self::new(catalog);

        tracker.level_stats = read_json::<BTreeMap<u32, LevelStatistics>>(store, KEY_LEVEL_STATS)
            .unwrap_or_default()
            .into_iter()
            .filter(|(level, _)| (1..=tracker.total_levels).contains(level))
            .map(|(level, mut stats)| {
                stats.best_stars = stats.best_stars.min(MAX_STARS);
                (level, stats)
            })
            .collect();

        let level_sum: u32 = tracker.level_stats.values().map(|s| s.best_stars as u32).sum();
        tracker.total_stars = read_json(store, KEY_TOTAL_STARS).unwrap_or(level_sum);

        if let Some(characters) = read_json::<BTreeSet<String>>(store, KEY_CHARACTERS) {
            tracker.unlocked_characters.extend(characters);
        }
        if let Some(list) = read_json::<Vec<UnlockedAchievement>>(store, KEY_ACHIEVEMENTS) {
            tracker.achievements = list
                .into_iter()
                .map(|u| (u.achievement, u.unlocked_at))
                .collect();
        }
        tracker.overall = read_json(store, KEY_OVERALL).unwrap_or_default();

        // しきい値を満たしている文字は黙って足す (通知はしない)
        let missing: Vec<String> = newly_unlocked(&tracker.unlocked_characters, tracker.total_stars)
            .into_iter()
            .map(str::to_string)
            .collect();
        tracker.unlocked_characters.extend(missing);
        tracker
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) {
        let achievements: Vec<UnlockedAchievement> = self
            .achievements
            .iter()
            .map(|(a, at)| UnlockedAchievement {
                achievement: *a,
                unlocked_at: *at,
            })
            .collect();

        write_json(store, KEY_TOTAL_STARS, &self.total_stars);
        write_json(store, KEY_CHARACTERS, &self.unlocked_characters);
        write_json(store, KEY_ACHIEVEMENTS, &achievements);
        write_json(store, KEY_LEVEL_STATS, &self.level_stats);
        write_json(store, KEY_OVERALL, &self.overall);
    }
}
