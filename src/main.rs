// ============================================
// src/main.rs (メインファイル)
// ターミナルで遊ぶためのフロントエンド
// ============================================

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::{Term, style};
use dialoguer::{Confirm, Select};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use kana_match::unlock::REWARD_GROUPS;
use kana_match::{
    Difficulty, FileStore, GameSession, GameSpeed, HiraganaGame, NextLevel, RoundReport,
    SettingField, UnlockEvent,
};

// --------------------------------------------------
// コマンドライン
// --------------------------------------------------

#[derive(Parser)]
#[command(name = "kana-match", version, about = "ひらがな と え を あわせよう！")]
struct Cli {
    /// セーブデータの場所 (省略時はOSのデータフォルダ)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// 乱数のシード (同じ問題を出したい時に)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// あそぶ (レベル省略時はおすすめのレベル)
    Play {
        #[arg(short, long)]
        level: Option<u32>,
    },
    /// スターと実績を見る
    Status,
    /// レベル一覧
    Levels,
    /// 解放したひらがな
    Collection,
    /// 設定
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// 進行データを消す
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    /// 例: settings set sound_volume 0.5
    Set { field: String, value: String },
    /// 設定を初期値に戻す
    Reset,
}

// --------------------------------------------------
// メイン関数
// --------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let dir = cli.data_dir.clone().unwrap_or_else(FileStore::default_dir);
    info!("save data directory: {}", dir.display());
    let mut game = HiraganaGame::open(FileStore::open(dir));

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    match cli.command.unwrap_or(Command::Play { level: None }) {
        Command::Play { level } => play(&mut game, level, &mut rng),
        Command::Status => {
            print_status(&game);
            Ok(())
        }
        Command::Levels => {
            print_levels(&game);
            Ok(())
        }
        Command::Collection => {
            print_collection(&game);
            Ok(())
        }
        Command::Settings { action } => match action.unwrap_or(SettingsAction::Show) {
            SettingsAction::Show => {
                print_settings(&game);
                Ok(())
            }
            SettingsAction::Set { field, value } => {
                apply_setting(&mut game, &field, &value)?;
                print_settings(&game);
                Ok(())
            }
            SettingsAction::Reset => {
                game.change_setting(|s| s.reset_to_defaults());
                print_settings(&game);
                Ok(())
            }
        },
        Command::Reset { yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("ほんとうに けしますか？")
                    .default(false)
                    .interact()?;
            if confirmed {
                game.reset_progress();
                println!("{}", style("さいしょから になりました").yellow());
            }
            Ok(())
        }
    }
}

// --------------------------------------------------
// あそぶ
// --------------------------------------------------

fn play(game: &mut HiraganaGame<FileStore>, level: Option<u32>, rng: &mut StdRng) -> Result<()> {
    let term = Term::stdout();
    let launched = Instant::now();
    let mut level = match level {
        Some(level) => level,
        None => recommended(game),
    };

    loop {
        let Some(mut session) = game.start_round(level, rng) else {
            bail!("レベル{}は まだ あそべません", level);
        };

        if let Some(def) = game.catalog().level(level) {
            term.clear_screen()?;
            println!("{}", style(format!("レベル{} {}", level, def.title)).bold().cyan());
            println!("{}\n", def.description);
        }

        play_round(game, &term, &mut session)?;
        let result = session.result();
        let Some(report) = game.finish_round(level, &result) else {
            bail!("けっかを きろくできませんでした");
        };
        print_report(&report);

        // プレイ時間の制限
        let limit = game.settings().settings().playtime_limit;
        if limit > 0 && launched.elapsed().as_secs() >= limit as u64 * 60 {
            println!("{}", style("きょうは ここまで！ またね").magenta());
            return Ok(());
        }

        let again = Confirm::new()
            .with_prompt("つぎの レベルで あそぶ？")
            .default(true)
            .interact()?;
        if !again {
            return Ok(());
        }
        level = recommended(game);
    }
}

fn recommended(game: &HiraganaGame<FileStore>) -> u32 {
    match game.progression().recommended_next_level() {
        NextLevel::Play(level) => level,
        NextLevel::AllComplete => game.progression().total_levels(),
    }
}

fn play_round(game: &HiraganaGame<FileStore>, term: &Term, session: &mut GameSession) -> Result<()> {
    let settings = game.settings().settings().clone();

    while let Some(question) = session.current_question().cloned() {
        let number = session.question_index() + 1;
        let target = if settings.large_text {
            format!("【 {} 】", question.target)
        } else {
            question.target.to_string()
        };
        println!(
            "{} {}",
            style(format!("{}/{}", number, session.total_questions())).dim(),
            style(target).bold().yellow()
        );
        if settings.show_hints {
            if let Some(hint) = game.catalog().hint_for(question.target) {
                println!("{}", style(hint).dim());
            }
        }

        let items: Vec<&str> = question.choices.iter().map(|c| c.concept).collect();
        let picked = Select::new()
            .with_prompt("どの え かな？")
            .items(&items)
            .default(0)
            .interact()?;

        let Some(outcome) = session.answer(items[picked]) else {
            break;
        };
        if outcome.correct {
            println!("{}", style("せいかい！").green().bold());
        } else {
            println!(
                "{} {} は {}",
                style("ざんねん…").red(),
                outcome.expected.symbol,
                outcome.expected.concept
            );
        }

        if !settings.auto_advance && !outcome.finished {
            println!("{}", style("なにか キーを おしてね").dim());
            term.read_key()?;
        }
        println!();
    }
    Ok(())
}

fn print_report(report: &RoundReport) {
    let stars = "★".repeat(report.stats.stars as usize) + &"☆".repeat(3 - report.stats.stars as usize);
    println!("{}", style(stars).yellow().bold());
    println!(
        "せいかいりつ {:.0}% / じかん {:.1}びょう (1もん {:.1}びょう)",
        report.stats.accuracy * 100.0,
        report.stats.elapsed_secs,
        report.stats.average_secs
    );
    if report.stars_gained > 0 {
        println!("{}", style(format!("スター +{}", report.stars_gained)).yellow());
    }

    for event in &report.events {
        match event {
            UnlockEvent::CharactersUnlocked(batch) => {
                println!("{} {}", style("あたらしい ひらがな！").green(), batch.join(" "));
            }
            UnlockEvent::AchievementUnlocked(achievement) => {
                println!(
                    "{} {} - {}",
                    style("じっせき").magenta().bold(),
                    achievement.title(),
                    achievement.description()
                );
            }
        }
    }
}

// --------------------------------------------------
// 表示
// --------------------------------------------------

fn print_status(game: &HiraganaGame<FileStore>) {
    let stats = game.progression().stats();
    let stars = game.unlocks().star_statistics();
    let progress = game.unlocks().unlock_progress();

    println!("{}", style("ステータス").bold().cyan());
    println!("スター: {}", stats.total_stars);
    println!(
        "クリア: {}/{} ({:.0}%)",
        stats.completed_levels,
        game.progression().total_levels(),
        stats.completion_fraction * 100.0
    );
    println!("平均スター: {:.1}", stats.average_stars_per_completed_level);
    println!("平均正解率: {:.0}%", stars.average_accuracy * 100.0);
    println!("プレイ時間: {:.0}びょう", stars.total_time_played);
    println!("連続クリア: {} (最高 {})", stars.current_streak, stars.highest_streak);
    println!(
        "ひらがな: {}/{} ({})",
        progress.unlocked_count, progress.total_count, progress.current_group
    );
    if let Some(next) = game.unlocks().next_unlock() {
        println!("つぎは {} まで あと{}スター", next.group_name, next.stars_needed);
    }
    match game.progression().recommended_next_level() {
        NextLevel::Play(level) => println!("おすすめ: レベル{}", level),
        NextLevel::AllComplete => println!("{}", style("ぜんぶ クリア！").green()),
    }

    println!("\n{}", style("じっせき").bold().magenta());
    let mut any = false;
    for (achievement, at) in game.unlocks().achievements() {
        any = true;
        println!("  {} ({})", achievement.title(), at.format("%Y-%m-%d"));
    }
    if !any {
        println!("  まだ ありません");
    }
}

fn print_levels(game: &HiraganaGame<FileStore>) {
    for def in game.catalog().levels() {
        let progression = game.progression();
        let best = progression.best_stars(def.number);
        let mark = if progression.is_unlocked(def.number) {
            "★".repeat(best as usize) + &"☆".repeat(3 - best as usize)
        } else {
            "🔒".to_string()
        };
        println!(
            "{:>2}. {} {} ({}もん)",
            def.number,
            mark,
            def.title,
            def.question_count
        );
    }
}

fn print_collection(game: &HiraganaGame<FileStore>) {
    let unlocks = game.unlocks();
    for group in REWARD_GROUPS {
        let row: Vec<String> = group
            .symbols
            .iter()
            .map(|s| {
                if unlocks.is_character_unlocked(s) {
                    s.to_string()
                } else {
                    "・".to_string()
                }
            })
            .collect();
        println!("{:<4} {} (★{})", group.name, row.join(" "), group.threshold);
    }
}

fn print_settings(game: &HiraganaGame<FileStore>) {
    let store = game.settings();
    let s = store.settings();
    let on_off = |b: bool| if b { "オン" } else { "オフ" };

    println!("{}", style("せってい").bold().cyan());
    println!("sound_enabled      {}", on_off(s.sound_enabled));
    println!("music_enabled      {}", on_off(s.music_enabled));
    println!("sound_volume       {}", store.formatted_volume());
    println!("voice_speed        {}", store.formatted_voice_speed());
    println!("playtime_limit     {}", store.formatted_playtime_limit());
    println!("game_speed         {}", s.game_speed.label());
    println!("difficulty         {}", s.difficulty.label());
    println!("auto_advance       {}", on_off(s.auto_advance));
    println!("show_hints         {}", on_off(s.show_hints));
    println!("large_text         {}", on_off(s.large_text));
    println!("reduce_animations  {}", on_off(s.reduce_animations));
}

// --------------------------------------------------
// 設定の変更
// --------------------------------------------------

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => bail!("{:?} は on / off で指定してください", value),
    }
}

fn parse_number(value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .with_context(|| format!("{:?} は数字ではありません", value))
}

fn apply_setting(game: &mut HiraganaGame<FileStore>, name: &str, value: &str) -> Result<()> {
    let Some(field) = SettingField::from_name(name) else {
        bail!("{:?} という設定はありません", name);
    };

    match field {
        SettingField::SoundEnabled => {
            let v = parse_bool(value)?;
            game.change_setting(|s| s.set_sound_enabled(v));
        }
        SettingField::MusicEnabled => {
            let v = parse_bool(value)?;
            game.change_setting(|s| s.set_music_enabled(v));
        }
        SettingField::SoundVolume => {
            let v = parse_number(value)?;
            game.change_setting(|s| s.set_volume(v));
        }
        SettingField::VoiceSpeed => {
            let v = parse_number(value)?;
            game.change_setting(|s| s.set_voice_speed(v));
        }
        SettingField::PlaytimeLimit => {
            let v = value
                .parse::<i64>()
                .with_context(|| format!("{:?} は分 (整数) で指定してください", value))?;
            game.change_setting(|s| s.set_playtime_limit(v));
        }
        SettingField::GameSpeed => {
            let Some(v) = GameSpeed::ALL
                .into_iter()
                .find(|g| format!("{:?}", g).eq_ignore_ascii_case(value))
            else {
                bail!("game_speed は slow / normal / fast のどれかです");
            };
            game.change_setting(|s| s.set_game_speed(v));
        }
        SettingField::Difficulty => {
            let Some(v) = Difficulty::ALL
                .into_iter()
                .find(|d| format!("{:?}", d).eq_ignore_ascii_case(value))
            else {
                bail!("difficulty は easy / normal / hard のどれかです");
            };
            game.change_setting(|s| s.set_difficulty(v));
        }
        SettingField::AutoAdvance => {
            let v = parse_bool(value)?;
            game.change_setting(|s| s.set_auto_advance(v));
        }
        SettingField::ShowHints => {
            let v = parse_bool(value)?;
            game.change_setting(|s| s.set_show_hints(v));
        }
        SettingField::LargeText => {
            let v = parse_bool(value)?;
            game.change_setting(|s| s.set_large_text(v));
        }
        SettingField::ReduceAnimations => {
            let v = parse_bool(value)?;
            game.change_setting(|s| s.set_reduce_animations(v));
        }
        SettingField::Reset => {
            game.change_setting(|s| s.reset_to_defaults());
        }
    }
    Ok(())
}
