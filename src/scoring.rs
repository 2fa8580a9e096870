// ============================================
// src/scoring.rs
// 正解数と時間からスター (0〜3) を計算する
// ============================================

use log::warn;
use serde::{Deserialize, Serialize};

pub const MAX_STARS: u8 = 3;

/// 1問あたりの平均時間がこの秒数以下ならスピードボーナス
pub const SPEED_BONUS_SECONDS: f64 = 6.0;

/// 1ラウンドの結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub correct: u32,
    pub total: u32,
    pub elapsed_secs: f64,
}

impl RoundResult {
    /// 時間が NaN の時は計れなかった扱い (無限大、ボーナスなし)
    pub fn new(correct: u32, total: u32, elapsed_secs: f64) -> Self {
        let elapsed_secs = if elapsed_secs.is_nan() {
            warn!("elapsed time is NaN, scoring without speed bonus");
            f64::INFINITY
        } else {
            elapsed_secs.max(0.0)
        };
        Self {
            correct: correct.min(total),
            total,
            elapsed_secs,
        }
    }

    /// 時間がちゃんと計れているか
    pub fn is_timed(&self) -> bool {
        self.elapsed_secs.is_finite()
    }

    /// 正解率 (0.0〜1.0)
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct.min(self.total) as f64 / self.total as f64
    }

    /// 1問あたりの平均秒数
    pub fn average_secs(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.elapsed_secs / self.total as f64
    }
}

/// リザルト画面用のまとめ
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GameStats {
    pub accuracy: f64,
    pub stars: u8,
    pub elapsed_secs: f64,
    pub average_secs: f64,
}

/// 正解率だけで決まる基本スター
pub fn base_stars(accuracy: f64) -> u8 {
    if accuracy >= 1.0 {
        3
    } else if accuracy >= 0.8 {
        2
    } else if accuracy >= 0.6 {
        1
    } else {
        0
    }
}

/// スター数を計算する (同じ入力なら常に同じ結果)
pub fn stars_for(correct: u32, total: u32, elapsed_secs: f64) -> u8 {
    let result = RoundResult::new(correct, total, elapsed_secs);
    if result.total == 0 {
        return 0;
    }

    let base = base_stars(result.accuracy());
    // スピードボーナスは1つ以上スターがある時だけ
    if base > 0 && result.average_secs() <= SPEED_BONUS_SECONDS {
        return (base + 1).min(MAX_STARS);
    }
    base
}

pub fn game_stats(result: &RoundResult) -> GameStats {
    GameStats {
        accuracy: result.accuracy(),
        stars: stars_for(result.correct, result.total, result.elapsed_secs),
        elapsed_secs: result.elapsed_secs,
        average_secs: result.average_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_fast_is_three_stars() {
        for total in 1..=20 {
            assert_eq!(stars_for(total, total, 0.01 * total as f64), 3);
        }
    }

    #[test]
    fn unknown_time_gets_no_bonus() {
        // 速くても遅くても同じ基本スターのまま
        assert_eq!(stars_for(4, 5, f64::NAN), 2);
        assert_eq!(stars_for(3, 5, f64::NAN), 1);
        assert_eq!(stars_for(4, 5, 1.0), 3);
        let result = RoundResult::new(4, 5, f64::NAN);
        assert!(!result.is_timed());
        assert_eq!(result.elapsed_secs, f64::INFINITY);
        assert!(RoundResult::new(4, 5, 12.0).is_timed());
    }

    #[test]
    fn nothing_right_is_zero_even_when_fast() {
        assert_eq!(stars_for(0, 5, 100.0), 0);
        assert_eq!(stars_for(0, 5, 1.0), 0);
    }

    #[test]
    fn accuracy_bands_without_bonus() {
        // 1問10秒なのでボーナスなし
        assert_eq!(stars_for(10, 10, 100.0), 3);
        assert_eq!(stars_for(9, 10, 100.0), 2);
        assert_eq!(stars_for(8, 10, 100.0), 2);
        assert_eq!(stars_for(7, 10, 100.0), 1);
        assert_eq!(stars_for(6, 10, 100.0), 1);
        assert_eq!(stars_for(5, 10, 100.0), 0);
    }

    #[test]
    fn speed_bonus_adds_one_star_up_to_the_cap() {
        assert_eq!(stars_for(6, 10, 60.0), 2);
        assert_eq!(stars_for(6, 10, 60.1), 1);
        assert_eq!(stars_for(8, 10, 30.0), 3);
        assert_eq!(stars_for(10, 10, 30.0), 3);
    }

    #[test]
    fn degenerate_input_is_clamped() {
        assert_eq!(stars_for(0, 0, 0.0), 0);
        assert_eq!(stars_for(9, 5, 100.0), 3);
        assert_eq!(RoundResult::new(9, 5, -3.0).accuracy(), 1.0);
        assert_eq!(RoundResult::new(9, 5, -3.0).elapsed_secs, 0.0);
    }

    #[test]
    fn stats_summary() {
        let stats = game_stats(&RoundResult::new(4, 5, 40.0));
        assert_eq!(stats.accuracy, 0.8);
        assert_eq!(stats.stars, 2);
        assert_eq!(stats.average_secs, 8.0);
    }
}
