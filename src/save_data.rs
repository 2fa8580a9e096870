// ============================================
// src/save_data.rs
// セーブデータ (キーバリューストア) の読み書きロジック
// ============================================

use bincode::config::standard;
use bincode::{Decode, Encode};
use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const SAVE_FILE_BIN: &str = "save_data.bin";
const SAVE_FILE_JSON: &str = "save_data.json"; // デバッグ用 + 読み込みのフォールバック

/// 保存まわりのエラー (ゲーム側ではログを出してデフォルトに戻す)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("save file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode save data: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("could not decode save data: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("invalid json in save data: {0}")]
    Json(#[from] serde_json::Error),
}

/// 進行状況や設定を保存する先
///
/// 値は JSON 文字列で持つ。最後に書いたものが勝つ。
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn save_all(&mut self) -> Result<(), StoreError>;
}

/// キーを読んで型に戻す。無い・壊れている時は None (壊れていたらログ)
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring unreadable value for {:?}: {}", key, e);
            None
        }
    }
}

/// 値を JSON にしてキーに書く
pub fn write_json<T: Serialize + ?Sized>(store: &mut dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => store.set(key, json),
        Err(e) => warn!("could not serialize {:?}: {}", key, e),
    }
}

/// 書き込みを確定する。失敗してもゲームは続ける
pub fn flush(store: &mut dyn KeyValueStore) {
    if let Err(e) = store.save_all() {
        warn!("saving progress failed, keeping in-memory state: {}", e);
    }
}

// MARK: メモリ上のストア (テスト用)

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// save_all が呼ばれた回数
    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn save_all(&mut self) -> Result<(), StoreError> {
        self.saves += 1;
        Ok(())
    }
}

// MARK: ファイルに保存するストア

/// bincode用の内部表現
#[derive(Encode, Decode)]
struct SaveFileBin {
    entries: BTreeMap<String, String>,
}

/// バイナリ + JSON の2つのファイルに保存するストア
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    // MARK:セーブファイルを置くディレクトリを取得する関数
    pub fn default_dir() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("jp", "Fukumoto0141", "KANA_MATCH") {
            return proj_dirs.data_dir().to_path_buf();
        }

        // 万が一取得できなかったらカレントディレクトリに（フォールバック）
        PathBuf::from(".")
    }

    /// ディレクトリを指定して開く。読めなければ空 (新規インストール扱い)
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let entries = match Self::load_entries(&dir) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                info!("no save data in {}, starting fresh", dir.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!("could not read save data in {}: {}", dir.display(), e);
                BTreeMap::new()
            }
        };
        Self { dir, entries }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bin_path(&self) -> PathBuf {
        self.dir.join(SAVE_FILE_BIN)
    }

    fn json_path(&self) -> PathBuf {
        self.dir.join(SAVE_FILE_JSON)
    }

    fn read_bin(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        let mut buffer = Vec::new();
        File::open(path)?.read_to_end(&mut buffer)?;
        let (bin, _): (SaveFileBin, usize) = bincode::decode_from_slice(&buffer, standard())?;
        Ok(bin.entries)
    }

    /// MARK:ファイルからデータを読み込む (バイナリ優先、JSONフォールバック)
    fn load_entries(dir: &Path) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let bin_path = dir.join(SAVE_FILE_BIN);
        let json_path = dir.join(SAVE_FILE_JSON);

        // 1. バイナリファイルから読み込みを試行
        if bin_path.exists() {
            match Self::read_bin(&bin_path) {
                Ok(entries) => {
                    debug!("loaded {} keys from {}", entries.len(), bin_path.display());
                    return Ok(Some(entries));
                }
                Err(e) => warn!("binary save data is unusable ({}), trying json", e),
            }
        }

        // 2. バイナリ失敗時、JSONファイルから読み込みを試行
        if json_path.exists() {
            let reader = BufReader::new(File::open(&json_path)?);
            let entries: BTreeMap<String, String> = serde_json::from_reader(reader)?;
            debug!("loaded {} keys from {}", entries.len(), json_path.display());
            return Ok(Some(entries));
        }

        Ok(None)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    /// MARK:データをファイルに保存する (バイナリ + JSON)
    fn save_all(&mut self) -> Result<(), StoreError> {
        // ディレクトリがまだなければ作成する
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        // --- 1. バイナリ形式で保存 (本番用) ---
        let bin = SaveFileBin {
            entries: self.entries.clone(),
        };
        let encoded = bincode::encode_to_vec(&bin, standard())?;
        let mut writer = BufWriter::new(File::create(self.bin_path())?);
        writer.write_all(&encoded)?;
        writer.flush()?;

        // --- 2. JSON形式で保存 (デバッグ用) ---
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(self.json_path(), json)?;

        debug!("saved {} keys to {}", self.entries.len(), self.dir.display());
        Ok(())
    }
}
