// ============================================
// src/session.rs
// 1ラウンド (数問) を遊んでいる最中の状態
// ============================================

use std::time::Instant;

use log::debug;
use rand::Rng;

use crate::catalog::{Catalog, KanaEntry};
use crate::questions::{Question, QuestionGenerator};
use crate::scoring::RoundResult;
use crate::settings::Difficulty;

/// 1問答えた結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// 正解の絵 (まちがえた時に見せる)
    pub expected: KanaEntry,
    /// ラウンドが終わったか
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    level: u32,
    questions: Vec<Question>,
    current: usize,
    score: u32,
    start_time: Instant,
}

impl GameSession {
    /// お題を作ってラウンドを始める。出題できなければ None
    pub fn start<R: Rng + ?Sized>(
        catalog: &Catalog,
        level: u32,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<Self> {
        let questions = QuestionGenerator::new(catalog).generate_round_for(level, difficulty, rng);
        Self::from_questions(level, questions)
    }

    pub fn from_questions(level: u32, questions: Vec<Question>) -> Option<Self> {
        if questions.is_empty() {
            return None;
        }
        Some(Self {
            level,
            questions,
            current: 0,
            score: 0,
            start_time: Instant::now(),
        })
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// 今の問題番号 (0始まり)
    pub fn question_index(&self) -> usize {
        self.current
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    /// 進み具合 (0.0〜1.0)
    pub fn progress(&self) -> f64 {
        self.current as f64 / self.questions.len() as f64
    }

    /// 絵を選んで次の問題へ進む。終わった後は None
    pub fn answer(&mut self, concept: &str) -> Option<AnswerOutcome> {
        let question = self.questions.get(self.current)?;
        let correct = question.is_correct(concept);
        let expected = question.correct;
        if correct {
            self.score += 1;
        }
        self.current += 1;
        debug!(
            "answered {} for {} ({}), score {}/{}",
            concept,
            question.target,
            if correct { "ok" } else { "miss" },
            self.score,
            self.questions.len()
        );

        Some(AnswerOutcome {
            correct,
            expected,
            finished: self.is_finished(),
        })
    }

    /// 始めてからの経過時間で結果を作る
    pub fn result(&self) -> RoundResult {
        self.result_after(self.start_time.elapsed().as_secs_f64())
    }

    /// 経過時間を指定して結果を作る
    pub fn result_after(&self, elapsed_secs: f64) -> RoundResult {
        RoundResult::new(self.score, self.questions.len() as u32, elapsed_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn playing_a_whole_round() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(5);
        let mut session = GameSession::start(&catalog, 1, Difficulty::Normal, &mut rng).unwrap();
        assert_eq!(session.total_questions(), 5);
        assert_eq!(session.progress(), 0.0);

        // 1問目だけわざとまちがえる
        let first = session.current_question().unwrap().clone();
        let wrong = first
            .choices
            .iter()
            .find(|c| c.concept != first.correct.concept)
            .unwrap()
            .concept;
        let outcome = session.answer(wrong).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.expected, first.correct);

        while let Some(q) = session.current_question() {
            let concept = q.correct.concept;
            session.answer(concept);
        }

        assert!(session.is_finished());
        assert!(session.answer("ant").is_none());
        assert_eq!(session.score(), 4);

        let result = session.result_after(20.0);
        assert_eq!(result.accuracy(), 0.8);
        assert_eq!(result.total, 5);
    }

    #[test]
    fn nothing_to_play_on_unknown_level() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(GameSession::start(&catalog, 99, Difficulty::Easy, &mut rng).is_none());
    }
}
