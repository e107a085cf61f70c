use clap::Parser;
use dialoguer::Input;
use koho_finder::cli::{Cli, Commands};
use koho_finder::config::Config;
use koho_finder::core::{AnswerResolution, Finder, OutcomeStatus};
use koho_finder::error::{FinderError, Result};
use koho_finder::{dialog, render, session};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Config { set_dataset, set_synonyms, show } => {
            let mut config = Config::load_or_default()?;

            if let Some(path) = set_dataset {
                config.set_dataset(path)?;
                println!("✔ データセットを設定しました");
            }

            if let Some(path) = set_synonyms {
                config.set_synonyms(path)?;
                println!("✔ 同義語ファイルを設定しました");
            }

            if show {
                println!("設定:");
                println!("  データセット: {}", config.dataset_path.display());
                println!(
                    "  同義語ファイル: {}",
                    config
                        .synonyms_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "未設定（組み込み辞書のみ）".to_string())
                );
                println!("  絞り込みしきい値: {}件", config.refine_threshold);
                println!("  上位表示件数: {}件", config.top_n);
                println!("  深さ候補の上限: {}件", config.depth_candidate_limit);
                println!("  補完モード: {:?}", config.completion_mode);
            }
        }

        Commands::Extract { text } => {
            let config = Config::load()?.with_overrides(cli.dataset, cli.synonyms);
            let finder = load_finder(&config)?;
            let (query, clarification) = finder.resolve(&text, None);
            println!("{}", query.explain());
            if let Some(clarification) = clarification {
                println!("\n確認が必要です:");
                println!("{}", render::render_clarification(&clarification));
            }
        }

        Commands::Search { text, answer } => {
            let config = Config::load()?.with_overrides(cli.dataset, cli.synonyms);
            let finder = load_finder(&config)?;
            run_search(&finder, &config, &text, &answer);
        }

        Commands::Chat => {
            let config = Config::load()?.with_overrides(cli.dataset, cli.synonyms);
            let finder = load_finder(&config)?;
            run_chat(&finder, &config)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_finder(config: &Config) -> Result<Finder> {
    if !config.dataset_path.exists() {
        return Err(FinderError::DatasetNotFound(
            config.dataset_path.display().to_string(),
        ));
    }
    let finder = Finder::load(
        &config.dataset_path,
        config.synonyms_path.as_deref(),
        config.finder_settings(),
    )?;
    Ok(finder)
}

/// 1回だけ検索
fn run_search(finder: &Finder, config: &Config, text: &str, answers: &[String]) {
    let (mut query, _) = finder.resolve(text, None);

    for answer in answers {
        if query.next_clarification().is_none() {
            break;
        }
        match query.answer(answer) {
            AnswerResolution::Applied(chosen) => {
                let labels: Vec<&str> = chosen.iter().map(|c| c.label.as_str()).collect();
                println!("✔ 選択: {}", labels.join(", "));
            }
            AnswerResolution::Skipped => println!("- スキップ"),
            AnswerResolution::Unresolved => println!("⚠ 回答を読み取れませんでした: {}", answer),
        }
    }

    println!("{}\n", query.explain());

    if let Some(clarification) = query.next_clarification() {
        println!("確認が必要です（--answer で回答してください）:");
        println!("{}", render::render_clarification(clarification));
        return;
    }

    let outcome = finder.evaluate(&query);
    match outcome.status {
        OutcomeStatus::Ok => {
            let rows = finder.present(&query, &outcome.hits);
            println!("{}", render::render_rows(&rows));
        }
        OutcomeStatus::NeedRefine => {
            let session = finder.open_refinement(query, outcome);
            if let Some(outcome) = session.outcome() {
                println!("{}\n", outcome.message);
            }
            println!("評価順の上位{}件:", config.top_n);
            println!("{}", render::render_records(&session.top_n(config.top_n)));
            if let Some(suggestion) = session.suggestion() {
                println!("\n{}", render::render_suggestion(&suggestion, config.top_n));
            }
        }
        OutcomeStatus::RangeOut => println!("{}", render::render_range_out(&outcome)),
        OutcomeStatus::NoResults | OutcomeStatus::InvalidConditions => println!("{}", outcome.message),
    }
}

/// 対話モード
fn run_chat(finder: &Finder, config: &Config) -> Result<()> {
    println!("🔎 koho-finder - 対話検索\n");
    println!("{}\n", dialog::WELCOME);

    let dialog = dialog::Dialog::new(finder, session::InMemorySessionStore::new(), config.top_n);
    loop {
        let input: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| FinderError::CliExecution(e.to_string()))?;

        if input.trim().is_empty() {
            continue;
        }

        let reply = dialog.handle("cli", &input);
        println!("\n{}\n", reply.text);
        if dialog::is_end_command(&input) {
            break;
        }
        if !reply.quick.is_empty() {
            println!("  候補: {}\n", reply.quick.join(" / "));
        }
    }

    Ok(())
}
