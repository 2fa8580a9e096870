// 遊んで、記録して、保存して、また開く までの流れ

use std::collections::HashSet;
use std::fs;

use rand::SeedableRng;
use rand::rngs::StdRng;

use kana_match::{
    Achievement, Catalog, FileStore, HiraganaGame, KeyValueStore, LevelProgressionTracker,
    MemoryStore, NextLevel, QuestionGenerator, RoundResult, UnlockEvent, UnlockTracker,
    stars_for,
};

#[test]
fn fresh_install_clear_level_one() {
    let catalog = Catalog::standard();
    let mut tracker = LevelProgressionTracker::new(&catalog);

    tracker.record_completion(1, 3);
    assert_eq!(tracker.total_stars(), 3);
    assert_eq!(tracker.best_stars(1), 3);
    assert!(tracker.is_unlocked(2));
    assert!(!tracker.is_unlocked(3));

    // 同じ結果をくり返しても合計は変わらない
    for _ in 0..5 {
        tracker.record_completion(1, 3);
        tracker.record_completion(1, 2);
    }
    assert_eq!(tracker.total_stars(), 3);
}

#[test]
fn unlock_thresholds_from_fresh_state() {
    let catalog = Catalog::standard();
    let mut unlocks = UnlockTracker::new(&catalog);
    assert_eq!(unlocks.unlocked_characters().len(), 5);

    unlocks.add_stars(1);
    let events = unlocks.refresh_unlocks();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], UnlockEvent::CharactersUnlocked(batch) if batch.len() == 5));
    assert_eq!(unlocks.unlocked_characters().len(), 10);
}

#[test]
fn generated_rounds_match_the_rules() {
    let catalog = Catalog::standard();
    let generator = QuestionGenerator::new(&catalog);
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..20 {
        let round = generator.generate_round(1, 5, 3, &mut rng);
        assert_eq!(round.len(), 5);
        for q in round {
            assert_eq!(q.choices.len(), 3);
            assert_eq!(q.choices.iter().filter(|c| c.symbol == q.target).count(), 1);
            let distractors: HashSet<_> = q
                .choices
                .iter()
                .filter(|c| c.symbol != q.target)
                .map(|c| c.concept)
                .collect();
            assert_eq!(distractors.len(), 2);
        }
    }
}

#[test]
fn scoring_examples() {
    for total in [1, 5, 10, 37] {
        assert_eq!(stars_for(total, total, 0.01 * total as f64), 3);
    }
    assert_eq!(stars_for(0, 5, 100.0), 0);
}

#[test]
fn whole_campaign_through_the_game() {
    let mut game = HiraganaGame::open(MemoryStore::new());
    let mut rng = StdRng::seed_from_u64(9);

    let mut achievements = Vec::new();
    for level in 1..=10 {
        let session = game.start_round(level, &mut rng).expect("level should be open");
        let total = session.total_questions() as u32;
        let report = game
            .finish_round(level, &RoundResult::new(total, total, total as f64 * 2.0))
            .unwrap();
        assert_eq!(report.stats.stars, 3);
        achievements.extend(report.events.iter().filter_map(|e| match e {
            UnlockEvent::AchievementUnlocked(a) => Some(*a),
            _ => None,
        }));
    }

    assert_eq!(game.progression().total_stars(), 30);
    assert_eq!(game.progression().recommended_next_level(), NextLevel::AllComplete);
    assert_eq!(game.unlocks().total_stars(), 30);

    // 実績はそれぞれ1回だけ
    let unique: HashSet<_> = achievements.iter().collect();
    assert_eq!(unique.len(), achievements.len());
    for a in [
        Achievement::FirstCompletion,
        Achievement::PerfectScore,
        Achievement::SpeedRun,
        Achievement::Streak,
        Achievement::Collector,
        Achievement::Master,
    ] {
        assert!(achievements.contains(&a), "{a:?} never fired");
    }
}

#[test]
fn progress_survives_a_restart_on_disk() {
    let dir = std::env::temp_dir().join(format!("kana-match-restart-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);

    {
        let mut game = HiraganaGame::open(FileStore::open(&dir));
        game.finish_round(1, &RoundResult::new(4, 5, 50.0)).unwrap();
        game.change_setting(|s| s.set_voice_speed(1.7));
    }

    let game = HiraganaGame::open(FileStore::open(&dir));
    assert_eq!(game.progression().best_stars(1), 2);
    assert!(game.progression().is_unlocked(2));
    assert_eq!(game.unlocks().total_stars(), 2);
    assert_eq!(game.unlocks().unlocked_characters().len(), 10);
    assert_eq!(game.settings().settings().voice_speed, 1.7);
    assert!(game.store().get("settings.voice_speed").is_some());

    let _ = fs::remove_dir_all(&dir);
}
