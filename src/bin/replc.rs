// パス: src/bin/replc.rs
// 役割: 対話シェル（またはスクリプト・単一ファイルのコンパイル）を起動するバイナリ
// 意図: 設定ファイルと CLI 引数から Settings を組み立て、ログを初期化してから実行する
// 関連ファイル: src/repl/cmd.rs, src/config.rs, src/logging.rs

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use replc::config::Settings;
use replc::logging;
use replc::pipeline::{CompilationUnit, Context, Pipeline};
use replc::repl::cmd::{run_repl, run_repl_with, BufReadSource};

/// Session-aware incremental REPL compiler
#[derive(Parser, Debug)]
#[command(name = "replc", version, about, long_about = None)]
struct Args {
    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write artifacts to this directory instead of memory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// trace | debug | info | warn | error | off
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Feed the lines of FILE to the shell instead of stdin
    #[arg(long, value_name = "FILE", conflicts_with = "compile")]
    script: Option<PathBuf>,

    /// Compile one source file with the standard pipeline and exit
    #[arg(long, value_name = "FILE")]
    compile: Option<PathBuf>,
}

fn settings_from(args: &Args) -> Result<Settings, replc::config::ConfigError> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(dir) = &args.output_dir {
        settings.output_dir = Some(dir.clone());
    }
    if let Some(level) = &args.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

fn compile_file(path: PathBuf, settings: Settings) -> ExitCode {
    let source = std::fs::read_to_string(&path).unwrap_or_default();
    let mut unit = CompilationUnit::from_file(path);
    let mut ctx = Context::new(settings);
    match Pipeline::standard().run(&mut unit, &mut ctx) {
        Ok(()) => {
            for w in ctx.diagnostics().warnings() {
                eprintln!("{}", w.render(&source));
            }
            for a in &unit.artifacts {
                println!("wrote {a}");
            }
            ExitCode::SUCCESS
        }
        Err(diags) => {
            eprintln!("{}", diags.render(&source));
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let settings = match settings_from(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("replc: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log_level);

    if let Some(path) = args.compile {
        return compile_file(path, settings);
    }

    let result = match args.script {
        Some(path) => File::open(&path).and_then(|f| {
            let mut source = BufReadSource::new(BufReader::new(f), false);
            run_repl_with(&mut source, &mut io::stdout(), &mut io::stderr(), settings)
        }),
        None => run_repl(settings),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("replc: {e}");
            ExitCode::FAILURE
        }
    }
}
