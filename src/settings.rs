// ============================================
// src/settings.rs
// ユーザー設定と、変更の通知
// ============================================

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::save_data::{KeyValueStore, read_json, write_json};

pub const VOLUME_RANGE: (f64, f64) = (0.0, 1.0);
pub const VOICE_SPEED_RANGE: (f64, f64) = (0.5, 2.0);

/// ゲームの速さ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl GameSpeed {
    pub const ALL: [GameSpeed; 3] = [GameSpeed::Slow, GameSpeed::Normal, GameSpeed::Fast];

    pub fn label(self) -> &'static str {
        match self {
            GameSpeed::Slow => "ゆっくり",
            GameSpeed::Normal => "ふつう",
            GameSpeed::Fast => "はやい",
        }
    }
}

/// 難易度 (選択肢の数が変わる)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    /// 1問あたりの絵の数
    pub fn choice_count(self) -> usize {
        match self {
            Difficulty::Easy => 2,
            Difficulty::Normal => 3,
            Difficulty::Hard => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "かんたん",
            Difficulty::Normal => "ふつう",
            Difficulty::Hard => "むずかしい",
        }
    }
}

/// どの設定が変わったか (変更通知に使う)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    SoundEnabled,
    MusicEnabled,
    SoundVolume,
    VoiceSpeed,
    PlaytimeLimit,
    GameSpeed,
    Difficulty,
    AutoAdvance,
    ShowHints,
    LargeText,
    ReduceAnimations,
    /// 全部まとめて初期値に戻した
    Reset,
}

impl SettingField {
    /// 保存対象の項目 (Reset 以外)
    pub const STORED: [SettingField; 11] = [
        SettingField::SoundEnabled,
        SettingField::MusicEnabled,
        SettingField::SoundVolume,
        SettingField::VoiceSpeed,
        SettingField::PlaytimeLimit,
        SettingField::GameSpeed,
        SettingField::Difficulty,
        SettingField::AutoAdvance,
        SettingField::ShowHints,
        SettingField::LargeText,
        SettingField::ReduceAnimations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingField::SoundEnabled => "sound_enabled",
            SettingField::MusicEnabled => "music_enabled",
            SettingField::SoundVolume => "sound_volume",
            SettingField::VoiceSpeed => "voice_speed",
            SettingField::PlaytimeLimit => "playtime_limit",
            SettingField::GameSpeed => "game_speed",
            SettingField::Difficulty => "difficulty",
            SettingField::AutoAdvance => "auto_advance",
            SettingField::ShowHints => "show_hints",
            SettingField::LargeText => "large_text",
            SettingField::ReduceAnimations => "reduce_animations",
            SettingField::Reset => "reset",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::STORED.into_iter().find(|f| f.as_str() == name)
    }

    /// 保存に使うキー
    pub fn store_key(self) -> String {
        format!("settings.{}", self.as_str())
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 設定の値そのもの
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub sound_enabled: bool,
    pub music_enabled: bool,
    pub sound_volume: f64,
    pub voice_speed: f64,
    /// 分。0 なら制限なし
    pub playtime_limit: u32,
    pub game_speed: GameSpeed,
    pub difficulty: Difficulty,
    pub auto_advance: bool,
    pub show_hints: bool,
    pub large_text: bool,
    pub reduce_animations: bool,
}

impl Default for Settings {
    /// 設定の初期値
    fn default() -> Self {
        Self {
            sound_enabled: true,
            music_enabled: true,
            sound_volume: 0.8,
            voice_speed: 1.0,
            playtime_limit: 0,
            game_speed: GameSpeed::Normal,
            difficulty: Difficulty::Normal,
            auto_advance: false,
            show_hints: true,
            large_text: false,
            reduce_animations: false,
        }
    }
}

impl Settings {
    /// 範囲内に収まっているか
    pub fn is_valid(&self) -> bool {
        (VOLUME_RANGE.0..=VOLUME_RANGE.1).contains(&self.sound_volume)
            && (VOICE_SPEED_RANGE.0..=VOICE_SPEED_RANGE.1).contains(&self.voice_speed)
    }
}

/// NaN は下限として扱う
fn clamp_to(value: f64, (min, max): (f64, f64)) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

type Listener = Box<dyn FnMut(SettingField, &Settings)>;

/// 設定と、その変更を受け取る購読者
#[derive(Default)]
pub struct SettingsStore {
    settings: Settings,
    listeners: Vec<(Option<SettingField>, Listener)>,
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.settings)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut store = Self::new();
        store.settings = settings;
        store.sanitize();
        store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 特定の項目の変更だけを受け取る (Reset も届く)
    pub fn subscribe(&mut self, field: SettingField, listener: impl FnMut(SettingField, &Settings) + 'static) {
        self.listeners.push((Some(field), Box::new(listener)));
    }

    /// すべての変更を受け取る
    pub fn subscribe_all(&mut self, listener: impl FnMut(SettingField, &Settings) + 'static) {
        self.listeners.push((None, Box::new(listener)));
    }

    fn notify(&mut self, field: SettingField) -> SettingField {
        debug!("setting changed: {}", field);
        let settings = &self.settings;
        for (filter, listener) in self.listeners.iter_mut() {
            let wanted = match filter {
                None => true,
                Some(f) => *f == field || field == SettingField::Reset,
            };
            if wanted {
                listener(field, settings);
            }
        }
        field
    }

    // MARK: セッター (範囲外はだまって丸める)

    pub fn set_sound_enabled(&mut self, enabled: bool) -> SettingField {
        self.settings.sound_enabled = enabled;
        self.notify(SettingField::SoundEnabled)
    }

    pub fn toggle_sound(&mut self) -> SettingField {
        self.settings.sound_enabled = !self.settings.sound_enabled;
        self.notify(SettingField::SoundEnabled)
    }

    pub fn set_music_enabled(&mut self, enabled: bool) -> SettingField {
        self.settings.music_enabled = enabled;
        self.notify(SettingField::MusicEnabled)
    }

    pub fn toggle_music(&mut self) -> SettingField {
        self.settings.music_enabled = !self.settings.music_enabled;
        self.notify(SettingField::MusicEnabled)
    }

    pub fn set_volume(&mut self, volume: f64) -> SettingField {
        self.settings.sound_volume = clamp_to(volume, VOLUME_RANGE);
        self.notify(SettingField::SoundVolume)
    }

    pub fn set_voice_speed(&mut self, speed: f64) -> SettingField {
        self.settings.voice_speed = clamp_to(speed, VOICE_SPEED_RANGE);
        self.notify(SettingField::VoiceSpeed)
    }

    /// 分で指定。マイナスは 0 (制限なし)
    pub fn set_playtime_limit(&mut self, minutes: i64) -> SettingField {
        self.settings.playtime_limit = minutes.clamp(0, u32::MAX as i64) as u32;
        self.notify(SettingField::PlaytimeLimit)
    }

    pub fn set_game_speed(&mut self, speed: GameSpeed) -> SettingField {
        self.settings.game_speed = speed;
        self.notify(SettingField::GameSpeed)
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> SettingField {
        self.settings.difficulty = difficulty;
        self.notify(SettingField::Difficulty)
    }

    pub fn set_auto_advance(&mut self, enabled: bool) -> SettingField {
        self.settings.auto_advance = enabled;
        self.notify(SettingField::AutoAdvance)
    }

    pub fn set_show_hints(&mut self, enabled: bool) -> SettingField {
        self.settings.show_hints = enabled;
        self.notify(SettingField::ShowHints)
    }

    pub fn set_large_text(&mut self, enabled: bool) -> SettingField {
        self.settings.large_text = enabled;
        self.notify(SettingField::LargeText)
    }

    pub fn set_reduce_animations(&mut self, enabled: bool) -> SettingField {
        self.settings.reduce_animations = enabled;
        self.notify(SettingField::ReduceAnimations)
    }

    pub fn reset_to_defaults(&mut self) -> SettingField {
        self.settings = Settings::default();
        self.notify(SettingField::Reset)
    }

    pub fn is_valid(&self) -> bool {
        self.settings.is_valid()
    }

    fn sanitize(&mut self) {
        self.settings.sound_volume = clamp_to(self.settings.sound_volume, VOLUME_RANGE);
        self.settings.voice_speed = clamp_to(self.settings.voice_speed, VOICE_SPEED_RANGE);
    }

    // MARK: 表示用

    pub fn formatted_volume(&self) -> String {
        format!("{}%", (self.settings.sound_volume * 100.0).round() as u32)
    }

    pub fn formatted_playtime_limit(&self) -> String {
        match self.settings.playtime_limit {
            0 => "制限なし".to_string(),
            minutes => format!("{}分", minutes),
        }
    }

    pub fn formatted_voice_speed(&self) -> String {
        format!("{:.1}x", self.settings.voice_speed)
    }

    // MARK: 保存と読み込み (1項目 = 1キー)

    /// 保存されている値を読み込む。無いキーは初期値のまま
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut s = Settings::default();
        for field in SettingField::STORED {
            let key = field.store_key();
            if store.get(&key).is_none() {
                continue;
            }
            let applied = match field {
                SettingField::SoundEnabled => read_json(store, &key).map(|v| s.sound_enabled = v),
                SettingField::MusicEnabled => read_json(store, &key).map(|v| s.music_enabled = v),
                SettingField::SoundVolume => read_json(store, &key).map(|v| s.sound_volume = v),
                SettingField::VoiceSpeed => read_json(store, &key).map(|v| s.voice_speed = v),
                SettingField::PlaytimeLimit => read_json(store, &key).map(|v| s.playtime_limit = v),
                SettingField::GameSpeed => read_json(store, &key).map(|v| s.game_speed = v),
                SettingField::Difficulty => read_json(store, &key).map(|v| s.difficulty = v),
                SettingField::AutoAdvance => read_json(store, &key).map(|v| s.auto_advance = v),
                SettingField::ShowHints => read_json(store, &key).map(|v| s.show_hints = v),
                SettingField::LargeText => read_json(store, &key).map(|v| s.large_text = v),
                SettingField::ReduceAnimations => {
                    read_json(store, &key).map(|v| s.reduce_animations = v)
                }
                SettingField::Reset => None,
            };
            if applied.is_none() {
                warn!("setting {} could not be restored, using default", field);
            }
        }
        Self::with_settings(s)
    }

    /// 1項目だけ保存する (Reset なら全部)
    pub fn save_field(&self, store: &mut dyn KeyValueStore, field: SettingField) {
        let s = &self.settings;
        let key = field.store_key();
        match field {
            SettingField::SoundEnabled => write_json(store, &key, &s.sound_enabled),
            SettingField::MusicEnabled => write_json(store, &key, &s.music_enabled),
            SettingField::SoundVolume => write_json(store, &key, &s.sound_volume),
            SettingField::VoiceSpeed => write_json(store, &key, &s.voice_speed),
            SettingField::PlaytimeLimit => write_json(store, &key, &s.playtime_limit),
            SettingField::GameSpeed => write_json(store, &key, &s.game_speed),
            SettingField::Difficulty => write_json(store, &key, &s.difficulty),
            SettingField::AutoAdvance => write_json(store, &key, &s.auto_advance),
            SettingField::ShowHints => write_json(store, &key, &s.show_hints),
            SettingField::LargeText => write_json(store, &key, &s.large_text),
            SettingField::ReduceAnimations => write_json(store, &key, &s.reduce_animations),
            SettingField::Reset => self.save(store),
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) {
        for field in SettingField::STORED {
            self.save_field(store, field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save_data::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn volume_and_voice_speed_are_clamped() {
        let mut store = SettingsStore::new();
        store.set_volume(-1.0);
        assert_eq!(store.settings().sound_volume, 0.0);
        store.set_volume(2.0);
        assert_eq!(store.settings().sound_volume, 1.0);
        store.set_voice_speed(0.1);
        assert_eq!(store.settings().voice_speed, 0.5);
        store.set_voice_speed(5.0);
        assert_eq!(store.settings().voice_speed, 2.0);
        store.set_volume(f64::NAN);
        assert_eq!(store.settings().sound_volume, 0.0);
        store.set_playtime_limit(-30);
        assert_eq!(store.settings().playtime_limit, 0);
        assert!(store.is_valid());
    }

    #[test]
    fn setters_report_the_changed_field() {
        let mut store = SettingsStore::new();
        assert_eq!(store.set_difficulty(Difficulty::Hard), SettingField::Difficulty);
        assert_eq!(store.toggle_sound(), SettingField::SoundEnabled);
        assert!(!store.settings().sound_enabled);
        assert_eq!(store.reset_to_defaults(), SettingField::Reset);
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn subscribers_only_hear_their_field() {
        let mut store = SettingsStore::new();
        let volume_events = Rc::new(RefCell::new(Vec::new()));
        let all_events = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&volume_events);
        store.subscribe(SettingField::SoundVolume, move |_, s| {
            sink.borrow_mut().push(s.sound_volume)
        });
        let sink = Rc::clone(&all_events);
        store.subscribe_all(move |field, _| sink.borrow_mut().push(field));

        store.set_volume(0.3);
        store.set_large_text(true);
        store.reset_to_defaults();

        assert_eq!(*volume_events.borrow(), vec![0.3, 0.8]);
        assert_eq!(
            *all_events.borrow(),
            vec![SettingField::SoundVolume, SettingField::LargeText, SettingField::Reset]
        );
    }

    #[test]
    fn each_field_has_its_own_key() {
        let mut kv = MemoryStore::new();
        let mut store = SettingsStore::new();
        store.set_voice_speed(1.5);
        store.set_game_speed(GameSpeed::Fast);
        store.save(&mut kv);
        assert_eq!(kv.len(), SettingField::STORED.len());
        assert_eq!(kv.get("settings.voice_speed").as_deref(), Some("1.5"));
        assert_eq!(kv.get("settings.game_speed").as_deref(), Some("\"fast\""));

        let restored = SettingsStore::load(&kv);
        assert_eq!(restored.settings(), store.settings());
    }

    #[test]
    fn missing_or_bad_keys_fall_back_to_defaults() {
        let mut kv = MemoryStore::new();
        kv.set("settings.sound_volume", "9.0".to_string());
        kv.set("settings.difficulty", "\"impossible\"".to_string());

        let restored = SettingsStore::load(&kv);
        assert_eq!(restored.settings().sound_volume, 1.0);
        assert_eq!(restored.settings().difficulty, Difficulty::Normal);
        assert!(restored.settings().show_hints);
    }

    #[test]
    fn formatting_helpers() {
        let mut store = SettingsStore::new();
        assert_eq!(store.formatted_volume(), "80%");
        assert_eq!(store.formatted_playtime_limit(), "制限なし");
        store.set_playtime_limit(15);
        assert_eq!(store.formatted_playtime_limit(), "15分");
        assert_eq!(store.formatted_voice_speed(), "1.0x");
        assert_eq!(SettingField::from_name("large_text"), Some(SettingField::LargeText));
        assert_eq!(SettingField::from_name("reset"), None);
    }
}
