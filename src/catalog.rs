// ============================================
// src/catalog.rs
// ひらがな と えの たいおうひょう、レベルごとの もじセット
// ============================================

use std::collections::BTreeSet;

use log::warn;
use serde::Serialize;

/// ひらがな1文字と、それを表す絵（コンセプト）の組
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KanaEntry {
    pub symbol: &'static str,   // "あ"
    pub concept: &'static str,  // 絵のキー (例: "ant")
    pub category: &'static str, // "animal" など
}

impl KanaEntry {
    /// 見つからなかった時に返す空のエントリ
    pub const PLACEHOLDER: KanaEntry = KanaEntry {
        symbol: "",
        concept: "",
        category: "",
    };

    pub fn is_placeholder(&self) -> bool {
        self.symbol.is_empty()
    }

    /// 読み上げ用の音声ファイル名
    pub fn sound_file_name(&self) -> String {
        format!("{}.mp3", self.symbol)
    }
}

/// 行ごとのひらがな (あ行 〜 わ行)
pub const KANA_ROWS: &[(&str, &[&str])] = &[
    ("あ行", &["あ", "い", "う", "え", "お"]),
    ("か行", &["か", "き", "く", "け", "こ"]),
    ("さ行", &["さ", "し", "す", "せ", "そ"]),
    ("た行", &["た", "ち", "つ", "て", "と"]),
    ("な行", &["な", "に", "ぬ", "ね", "の"]),
    ("は行", &["は", "ひ", "ふ", "へ", "ほ"]),
    ("ま行", &["ま", "み", "む", "め", "も"]),
    ("や行", &["や", "ゆ", "よ"]),
    ("ら行", &["ら", "り", "る", "れ", "ろ"]),
    ("わ行", &["わ", "ゐ", "ゑ", "を", "ん"]),
];

/// 絵あわせ用のデータ (コンセプトのキーはすべて重複なし)
pub const KANA_TABLE: &[KanaEntry] = &[
    // あ行
    KanaEntry { symbol: "あ", concept: "ant", category: "animal" },
    KanaEntry { symbol: "い", concept: "dog", category: "animal" },
    KanaEntry { symbol: "う", concept: "rabbit", category: "animal" },
    KanaEntry { symbol: "え", concept: "shrimp", category: "animal" },
    KanaEntry { symbol: "お", concept: "demon", category: "character" },

    // か行
    KanaEntry { symbol: "か", concept: "crab", category: "animal" },
    KanaEntry { symbol: "き", concept: "giraffe", category: "animal" },
    KanaEntry { symbol: "く", concept: "bear", category: "animal" },
    KanaEntry { symbol: "け", concept: "cake", category: "food" },
    KanaEntry { symbol: "こ", concept: "top", category: "toy" },

    // さ行
    KanaEntry { symbol: "さ", concept: "monkey", category: "animal" },
    KanaEntry { symbol: "し", concept: "deer", category: "animal" },
    KanaEntry { symbol: "す", concept: "watermelon", category: "food" },
    KanaEntry { symbol: "せ", concept: "cicada", category: "animal" },
    KanaEntry { symbol: "そ", concept: "sky", category: "nature" },

    // た行
    KanaEntry { symbol: "た", concept: "octopus", category: "animal" },
    KanaEntry { symbol: "ち", concept: "butterfly", category: "animal" },
    KanaEntry { symbol: "つ", concept: "crane", category: "animal" },
    KanaEntry { symbol: "て", concept: "hand", category: "body" },
    KanaEntry { symbol: "と", concept: "clock", category: "object" },

    // な行
    KanaEntry { symbol: "な", concept: "eggplant", category: "food" },
    KanaEntry { symbol: "に", concept: "carrot", category: "food" },
    KanaEntry { symbol: "ぬ", concept: "doll", category: "toy" },
    KanaEntry { symbol: "ね", concept: "cat", category: "animal" },
    KanaEntry { symbol: "の", concept: "field", category: "nature" },

    // は行
    KanaEntry { symbol: "は", concept: "flower", category: "nature" },
    KanaEntry { symbol: "ひ", concept: "chick", category: "animal" },
    KanaEntry { symbol: "ふ", concept: "boat", category: "vehicle" },
    KanaEntry { symbol: "へ", concept: "snake", category: "animal" },
    KanaEntry { symbol: "ほ", concept: "bone", category: "object" },

    // ま行
    KanaEntry { symbol: "ま", concept: "bean", category: "food" },
    KanaEntry { symbol: "み", concept: "ear", category: "body" },
    KanaEntry { symbol: "む", concept: "bug", category: "animal" },
    KanaEntry { symbol: "め", concept: "eye", category: "body" },
    KanaEntry { symbol: "も", concept: "peach", category: "food" },

    // や行
    KanaEntry { symbol: "や", concept: "arrow", category: "object" },
    KanaEntry { symbol: "ゆ", concept: "hot_water", category: "object" },
    KanaEntry { symbol: "よ", concept: "night", category: "nature" },

    // ら行
    KanaEntry { symbol: "ら", concept: "trumpet", category: "instrument" },
    KanaEntry { symbol: "り", concept: "apple", category: "food" },
    KanaEntry { symbol: "る", concept: "loop", category: "object" },
    KanaEntry { symbol: "れ", concept: "refrigerator", category: "appliance" },
    KanaEntry { symbol: "ろ", concept: "candle", category: "object" },

    // わ行 (ゐ・ゑ は古いかな)
    KanaEntry { symbol: "わ", concept: "ring", category: "object" },
    KanaEntry { symbol: "ゐ", concept: "well", category: "nature" },
    KanaEntry { symbol: "ゑ", concept: "picture", category: "object" },
    KanaEntry { symbol: "を", concept: "man", category: "character" },
    KanaEntry { symbol: "ん", concept: "antenna", category: "object" },
];

/// レベルの定義
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelDefinition {
    pub number: u32,
    pub title: &'static str,
    pub description: &'static str,
    /// それまでの行をふくむ、このレベルで出題される文字
    pub characters: Vec<&'static str>,
    /// 目安として表示する必要スター数
    pub required_stars: u32,
    pub question_count: usize,
}

/// (タイトル, 説明, 必要スター, 問題数)
const LEVEL_META: &[(&str, &str, u32, usize)] = &[
    ("あ行をおぼえよう", "ひらがなの基本、あ行をマスターしよう！", 0, 5),
    ("か行をおぼえよう", "か行を覚えて、ひらがなの世界を広げよう！", 2, 5),
    ("さ行をおぼえよう", "さ行をマスターして、更にレベルアップ！", 4, 6),
    ("た行をおぼえよう", "た行も仲間に加えて、どんどん上達！", 6, 6),
    ("な行をおぼえよう", "な行を覚えて、ひらがなマスターに近づこう！", 8, 7),
    ("は行をおぼえよう", "は行をマスターして、さらなる高みを目指そう！", 10, 7),
    ("ま行をおぼえよう", "ま行も覚えて、ひらがなの達人に！", 12, 8),
    ("や行をおぼえよう", "や行をマスターして、ゴールが見えてきた！", 14, 8),
    ("ら行をおぼえよう", "ら行をクリアして、最終ステージへ！", 16, 9),
    ("すべてのひらがな", "全てのひらがなをマスターして、真のひらがな博士になろう！", 18, 10),
];

/// ひらがなデータの参照用カタログ (起動時に1度だけ作る)
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: &'static [KanaEntry],
    levels: Vec<LevelDefinition>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    /// 標準のテーブルからカタログを作る
    pub fn standard() -> Self {
        let mut levels = Vec::with_capacity(LEVEL_META.len());
        let mut characters: Vec<&'static str> = Vec::new();

        for (i, (title, description, required_stars, question_count)) in
            LEVEL_META.iter().enumerate()
        {
            // 前のレベルの文字に、新しい行を足していく
            characters.extend_from_slice(KANA_ROWS[i].1);
            levels.push(LevelDefinition {
                number: i as u32 + 1,
                title: *title,
                description: *description,
                characters: characters.clone(),
                required_stars: *required_stars,
                question_count: *question_count,
            });
        }

        Self {
            entries: KANA_TABLE,
            levels,
        }
    }

    pub fn total_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn levels(&self) -> &[LevelDefinition] {
        &self.levels
    }

    /// レベル番号から定義を取得 (1始まり)
    pub fn level(&self, level: u32) -> Option<&LevelDefinition> {
        let index = level.checked_sub(1)?;
        self.levels.get(index as usize)
    }

    pub fn entry_for(&self, symbol: &str) -> Option<&KanaEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    /// 見つからなければ空のエントリを返す (ゲームは止めない)
    pub fn entry_or_placeholder(&self, symbol: &str) -> KanaEntry {
        match self.entry_for(symbol) {
            Some(entry) => *entry,
            None => {
                warn!("unknown kana {:?}, using placeholder entry", symbol);
                KanaEntry::PLACEHOLDER
            }
        }
    }

    /// レベルで出題される文字 (未定義のレベルなら空)
    pub fn entries_for_level(&self, level: u32) -> Vec<&'static str> {
        self.level(level)
            .map(|def| def.characters.clone())
            .unwrap_or_default()
    }

    pub fn all_symbols(&self) -> BTreeSet<&'static str> {
        self.entries.iter().map(|e| e.symbol).collect()
    }

    pub fn entries(&self) -> &'static [KanaEntry] {
        self.entries
    }

    /// 選んだ絵が正解かどうか
    pub fn is_correct_answer(&self, symbol: &str, concept: &str) -> bool {
        self.entry_for(symbol)
            .is_some_and(|entry| entry.concept == concept)
    }

    /// ヒントの文章
    pub fn hint_for(&self, symbol: &str) -> Option<String> {
        self.entry_for(symbol)
            .map(|entry| format!("{}は{}の仲間だよ！", entry.symbol, entry.category))
    }
}
