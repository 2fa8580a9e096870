// ============================================
// src/lib.rs
// ひらがな えあわせ ゲームのルール部分
// ============================================

pub mod catalog;
pub mod game;
pub mod progression;
pub mod questions;
pub mod save_data;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod unlock;

pub use catalog::{Catalog, KanaEntry, LevelDefinition};
pub use game::{HiraganaGame, RoundReport};
pub use progression::{LevelProgressionTracker, NextLevel, ProgressionStats};
pub use questions::{Question, QuestionGenerator};
pub use save_data::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use scoring::{GameStats, RoundResult, stars_for};
pub use session::{AnswerOutcome, GameSession};
pub use settings::{Difficulty, GameSpeed, SettingField, Settings, SettingsStore};
pub use unlock::{Achievement, UnlockEvent, UnlockTracker};
