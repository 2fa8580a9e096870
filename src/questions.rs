/*
 * src/questions.rs
 * 1ラウンド分のお題 (ひらがな + 絵の選択肢) を作るモジュール
 */

use log::{debug, warn};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::Serialize;

use crate::catalog::{Catalog, KanaEntry};
use crate::settings::Difficulty;

pub const MIN_CHOICES: usize = 2;
pub const MAX_CHOICES: usize = 4;

/// 1問分のお題
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    /// 表示するひらがな
    pub target: &'static str,
    /// 並べる絵の選択肢 (正解を1つだけふくむ)
    pub choices: Vec<KanaEntry>,
    pub correct: KanaEntry,
}

impl Question {
    /// 選ばれた絵が正解か
    pub fn is_correct(&self, concept: &str) -> bool {
        !self.correct.is_placeholder() && self.correct.concept == concept
    }

    /// 正解が何番目にあるか
    pub fn correct_index(&self) -> Option<usize> {
        self.choices.iter().position(|c| c == &self.correct)
    }
}

/// お題を作る係
#[derive(Debug, Clone, Copy)]
pub struct QuestionGenerator<'a> {
    catalog: &'a Catalog,
}

impl<'a> QuestionGenerator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// レベルと問題数・選択肢数を指定してお題を作る
    ///
    /// 出題するひらがなは重複ありで選ぶ。未定義のレベルなら空を返す。
    pub fn generate_round<R: Rng + ?Sized>(
        &self,
        level: u32,
        question_count: usize,
        choice_count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let characters = self.catalog.entries_for_level(level);
        if characters.is_empty() {
            warn!("level {} has no characters, nothing to play", level);
            return Vec::new();
        }

        let choice_count = choice_count.clamp(MIN_CHOICES, MAX_CHOICES);
        let mut questions = Vec::with_capacity(question_count);

        for _ in 0..question_count {
            let Some(&target) = characters.choose(rng) else {
                break;
            };
            let Some(correct) = self.catalog.entry_for(target).copied() else {
                // テーブルにない文字は飛ばす
                warn!("level {} lists unknown kana {:?}", level, target);
                continue;
            };
            let choices = self.choices_for(&correct, choice_count, rng);
            questions.push(Question {
                target,
                choices,
                correct,
            });
        }

        debug!(
            "generated {} questions for level {} ({} choices)",
            questions.len(),
            level,
            choice_count
        );
        questions
    }

    /// レベル定義の問題数と、難易度の選択肢数でお題を作る
    pub fn generate_round_for<R: Rng + ?Sized>(
        &self,
        level: u32,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Vec<Question> {
        let question_count = self
            .catalog
            .level(level)
            .map(|def| def.question_count)
            .unwrap_or(0);
        self.generate_round(level, question_count, difficulty.choice_count(), rng)
    }

    /// 正解1つ + まちがい (choice_count - 1) 個をシャッフルして返す
    fn choices_for<R: Rng + ?Sized>(
        &self,
        correct: &KanaEntry,
        choice_count: usize,
        rng: &mut R,
    ) -> Vec<KanaEntry> {
        let others: Vec<KanaEntry> = self
            .catalog
            .entries()
            .iter()
            .filter(|e| e.symbol != correct.symbol)
            .copied()
            .collect();

        let mut choices: Vec<KanaEntry> = others
            .choose_multiple(rng, choice_count - 1)
            .copied()
            .collect();
        choices.push(*correct);
        choices.shuffle(rng);
        choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn level_one_round_has_the_requested_shape() {
        let catalog = Catalog::standard();
        let generator = QuestionGenerator::new(&catalog);

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let round = generator.generate_round(1, 5, 3, &mut rng);
            assert_eq!(round.len(), 5);

            for q in &round {
                assert_eq!(q.choices.len(), 3);
                assert_eq!(q.correct.symbol, q.target);
                assert!(catalog.entries_for_level(1).contains(&q.target));

                let hits = q.choices.iter().filter(|c| c.symbol == q.target).count();
                assert_eq!(hits, 1);

                let concepts: HashSet<_> = q.choices.iter().map(|c| c.concept).collect();
                assert_eq!(concepts.len(), 3);
                assert!(q.is_correct(q.correct.concept));
            }
        }
    }

    #[test]
    fn correct_position_varies() {
        let catalog = Catalog::standard();
        let generator = QuestionGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(7);

        let positions: HashSet<_> = generator
            .generate_round(3, 60, 4, &mut rng)
            .iter()
            .filter_map(Question::correct_index)
            .collect();
        assert!(positions.len() > 1);
    }

    #[test]
    fn choice_count_is_clamped() {
        let catalog = Catalog::standard();
        let generator = QuestionGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(1);

        let round = generator.generate_round(2, 3, 9, &mut rng);
        assert!(round.iter().all(|q| q.choices.len() == MAX_CHOICES));

        let round = generator.generate_round(2, 3, 0, &mut rng);
        assert!(round.iter().all(|q| q.choices.len() == MIN_CHOICES));
    }

    #[test]
    fn unknown_level_yields_empty_round() {
        let catalog = Catalog::standard();
        let generator = QuestionGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(generator.generate_round(0, 5, 3, &mut rng).is_empty());
        assert!(generator.generate_round(42, 5, 3, &mut rng).is_empty());
    }

    #[test]
    fn difficulty_drives_choices_and_level_drives_count() {
        let catalog = Catalog::standard();
        let generator = QuestionGenerator::new(&catalog);
        let mut rng = StdRng::seed_from_u64(11);

        let easy = generator.generate_round_for(3, Difficulty::Easy, &mut rng);
        assert_eq!(easy.len(), 6);
        assert!(easy.iter().all(|q| q.choices.len() == 2));

        let hard = generator.generate_round_for(10, Difficulty::Hard, &mut rng);
        assert_eq!(hard.len(), 10);
        assert!(hard.iter().all(|q| q.choices.len() == 4));
    }
}
