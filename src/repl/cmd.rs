// パス: src/repl/cmd.rs
// 役割: REPL のコマンドループ、コマンド解釈、対話ごとのコンパイル呼び出し
// 意図: 入力行をまとめて対話にし、ドライバと型調査へ橋渡しする
// 関連ファイル: src/repl/compiler.rs, src/repl/printer.rs, src/bin/replc.rs
//! 対話シェル
//!
//! 通常の入力は 1 回の対話としてコンパイルされ、成功時は利用者に見える束縛を型付きで表示する。
//! `:` で始まる行はコマンドとして扱う。

use std::io::{self, BufRead, Write};

use super::compiler::ReplCompiler;
use super::imports::import_chain;
use super::printer::{diagnostic_lines, member_lines, render_help};
use super::state::SessionState;
use super::wrapper::wrapper_name;
use crate::config::Settings;
use crate::pipeline::Context;

/// 1 行読み込みの結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Line(String),
    Eof,
}

pub trait ReplLineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult>;
}

/// `BufRead` から行を読む入力源。`show_prompt` が true ならプロンプトを標準出力へ書く。
pub struct BufReadSource<R> {
    reader: R,
    show_prompt: bool,
}

impl<R: BufRead> BufReadSource<R> {
    pub fn new(reader: R, show_prompt: bool) -> Self {
        Self {
            reader,
            show_prompt,
        }
    }
}

impl<R: BufRead> ReplLineSource for BufReadSource<R> {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadResult> {
        if self.show_prompt {
            let mut stdout = io::stdout();
            write!(stdout, "{prompt}")?;
            stdout.flush()?;
        }
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ReadResult::Eof);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(ReadResult::Line(line))
    }
}

/// 標準入力から対話セッションを開始する。
pub fn run_repl(settings: Settings) -> io::Result<()> {
    let stdin = io::stdin();
    let mut source = BufReadSource::new(stdin.lock(), true);
    run_repl_with(&mut source, &mut io::stdout(), &mut io::stderr(), settings)
}

pub fn run_repl_with<S, W, E>(
    source: &mut S,
    out: &mut W,
    err: &mut E,
    settings: Settings,
) -> io::Result<()>
where
    S: ReplLineSource,
    W: Write,
    E: Write,
{
    writeln!(out, "replc :: :t EXPR で型 :: :help でヘルプ")?;
    let mut session = ReplSession::new(settings);
    let mut buffer = String::new();

    'repl: loop {
        buffer.clear();
        let mut prompt = "> ";
        let input = loop {
            match source.read_line(prompt)? {
                ReadResult::Line(line) => {
                    buffer.push_str(&line);
                    buffer.push('\n');
                    if needs_more_input(&buffer) {
                        prompt = ".. ";
                        continue;
                    }
                    break buffer.trim().to_string();
                }
                ReadResult::Eof => {
                    if buffer.trim().is_empty() {
                        break 'repl;
                    }
                    break buffer.trim().to_string();
                }
            }
        };
        if input.is_empty() {
            continue;
        }

        match parse_repl_command(&input) {
            ReplCommand::Help => render_help(out)?,
            ReplCommand::Quit => break,
            other => dispatch_messages(session.execute(other), out, err)?,
        }
    }
    Ok(())
}

fn dispatch_messages<W: Write, E: Write>(
    msgs: Vec<ReplMsg>,
    out: &mut W,
    err: &mut E,
) -> io::Result<()> {
    for msg in msgs {
        match msg {
            ReplMsg::Out(s) => writeln!(out, "{s}")?,
            ReplMsg::Err(s) => writeln!(err, "{s}")?,
        }
    }
    Ok(())
}

/// 括弧・波括弧・文字列が閉じていなければ次の行を待つ。
fn needs_more_input(src: &str) -> bool {
    if src.trim_start().starts_with(':') {
        return false;
    }
    let mut paren = 0i32;
    let mut brace = 0i32;
    let mut in_str = false;
    let mut esc = false;
    let mut chars = src.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_str {
            if esc {
                esc = false;
                continue;
            }
            match ch {
                '\\' => esc = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '/' if chars.peek() == Some(&'/') => {
                // 行末までコメント
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => paren += 1,
            ')' => paren -= 1,
            '{' => brace += 1,
            '}' => brace -= 1,
            '"' => in_str = true,
            _ => {}
        }
    }
    paren > 0 || brace > 0 || in_str
}

/// 対話をまたぐセッション（状態・文脈・コンパイラ）。
pub struct ReplSession {
    compiler: ReplCompiler,
    settings: Settings,
    state: SessionState,
    context: Context,
}

impl ReplSession {
    pub fn new(settings: Settings) -> Self {
        Self {
            compiler: ReplCompiler::new(),
            context: Context::new(settings.clone()),
            settings,
            state: SessionState::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// 解釈済みコマンドを実行し、出力メッセージを返す。
    pub fn execute(&mut self, cmd: ReplCommand) -> Vec<ReplMsg> {
        use ReplCommand::*;
        match cmd {
            TypeOf(src) => self.exec_type_of(&src),
            Imports => self.exec_imports(),
            Reset => self.exec_reset(),
            Compile(src) => self.exec_compile(&src),
            Help | Quit => Vec::new(),
            Invalid(s) => vec![ReplMsg::Err(format!(
                "エラー: コマンド形式が不正です: {s}"
            ))],
        }
    }

    fn exec_type_of(&self, src: &str) -> Vec<ReplMsg> {
        match self.compiler.type_of(src, &self.state, &self.context) {
            Ok(ty) => vec![ReplMsg::Out(format!("-- {ty}"))],
            Err(diags) => diagnostic_lines(&diags, src)
                .into_iter()
                .map(ReplMsg::Err)
                .collect(),
        }
    }

    fn exec_imports(&self) -> Vec<ReplMsg> {
        let mut msgs: Vec<ReplMsg> = import_chain(self.state.object_index())
            .into_iter()
            .map(|i| ReplMsg::Out(format!("  {i}")))
            .collect();
        msgs.extend(self.state.imports().iter().map(|b| {
            ReplMsg::Out(format!(
                "  {}  (from {})",
                b.import,
                wrapper_name(b.module_index)
            ))
        }));
        msgs
    }

    fn exec_reset(&mut self) -> Vec<ReplMsg> {
        self.state = SessionState::new();
        self.context = Context::new(self.settings.clone());
        vec![ReplMsg::Out("セッションを初期化しました".into())]
    }

    fn exec_compile(&mut self, src: &str) -> Vec<ReplMsg> {
        match self.compiler.compile_source(src, &self.state, &self.context) {
            Ok(compiled) => {
                let mut msgs: Vec<ReplMsg> = diagnostic_lines(compiled.warnings(), src)
                    .into_iter()
                    .map(ReplMsg::Err)
                    .collect();
                msgs.extend(member_lines(&compiled).into_iter().map(ReplMsg::Out));
                self.state = compiled.state;
                self.context = compiled.context;
                msgs
            }
            Err(diags) => diagnostic_lines(&diags, src)
                .into_iter()
                .map(ReplMsg::Err)
                .collect(),
        }
    }
}

/// 対話セッションがユーザーへ返す応答メッセージのカテゴリ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplMsg {
    Out(String),
    Err(String),
}

/// REPL が解釈できるトップレベルコマンドの集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `:help` / `:h`
    Help,
    /// `:quit` / `:q`
    Quit,
    /// `:t` / `:type` で式の型を照会する。
    TypeOf(String),
    /// `:imports` で import 連鎖を表示する。
    Imports,
    /// `:reset` でセッションを初期状態に戻す。
    Reset,
    /// コマンド以外の入力（1 回の対話）。
    Compile(String),
    /// シンタックスが認識できなかったコマンド入力。
    Invalid(String),
}

/// 生の入力文字列を `ReplCommand` 列挙に解析する。
pub fn parse_repl_command(input: &str) -> ReplCommand {
    let s = input.trim();
    match s {
        ":help" | ":h" => return ReplCommand::Help,
        ":quit" | ":q" => return ReplCommand::Quit,
        ":imports" => return ReplCommand::Imports,
        ":reset" => return ReplCommand::Reset,
        _ => {}
    }
    for prefix in [":type ", ":t "] {
        if let Some(rest) = s.strip_prefix(prefix) {
            let expr = rest.trim();
            if !expr.is_empty() {
                return ReplCommand::TypeOf(expr.to_string());
            }
        }
    }
    if s.starts_with(':') {
        return ReplCommand::Invalid(s.to_string());
    }
    ReplCommand::Compile(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    /// 括弧・波括弧・文字列の開閉で継続入力を判定する。
    fn needs_more_input_balancing() {
        assert!(needs_more_input("(1 +"));
        assert!(needs_more_input("val a = {\n"));
        assert!(needs_more_input("\"abc"));
        assert!(!needs_more_input("\"(\""));
        assert!(!needs_more_input("1 // (\n"));
        assert!(!needs_more_input(":t (1"));
    }

    #[test]
    fn parse_repl_command_variants() {
        assert_eq!(parse_repl_command(":h"), ReplCommand::Help);
        assert_eq!(parse_repl_command(":q"), ReplCommand::Quit);
        assert_eq!(parse_repl_command(":imports"), ReplCommand::Imports);
        assert_eq!(parse_repl_command(":reset"), ReplCommand::Reset);
        assert_eq!(
            parse_repl_command(":t 1 + 2"),
            ReplCommand::TypeOf("1 + 2".into())
        );
        assert_eq!(
            parse_repl_command(":type  x "),
            ReplCommand::TypeOf("x".into())
        );
        assert_eq!(
            parse_repl_command(":type"),
            ReplCommand::Invalid(":type".into())
        );
        assert_eq!(
            parse_repl_command(":load x"),
            ReplCommand::Invalid(":load x".into())
        );
        assert_eq!(
            parse_repl_command(" val a = 1 "),
            ReplCommand::Compile("val a = 1".into())
        );
    }

    fn outs(msgs: &[ReplMsg]) -> Vec<&str> {
        msgs.iter()
            .filter_map(|m| match m {
                ReplMsg::Out(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    /// 成功した対話で状態が進み、失敗では変わらない。
    fn compile_success_and_failure() {
        let mut session = ReplSession::new(Settings::default());
        let msgs = session.execute(ReplCommand::Compile("var x = 1".into()));
        assert_eq!(outs(&msgs), vec!["var x: Int"]);
        assert_eq!(session.state().object_index(), 1);

        let before = session.state().clone();
        let msgs = session.execute(ReplCommand::Compile("x := \"s\"".into()));
        assert!(matches!(&msgs[0], ReplMsg::Err(s) if s.contains("TYP001")));
        assert_eq!(session.state(), &before);

        let msgs = session.execute(ReplCommand::Compile("x := 10".into()));
        assert_eq!(outs(&msgs), vec!["val res0: Int"]);
        let msgs = session.execute(ReplCommand::TypeOf("res0 + x".into()));
        assert_eq!(outs(&msgs), vec!["-- Int"]);
    }

    #[test]
    fn imports_and_reset() {
        let mut session = ReplSession::new(Settings::default());
        session.execute(ReplCommand::Compile("import Math._".into()));
        let msgs = session.execute(ReplCommand::Imports);
        assert_eq!(
            outs(&msgs),
            vec![
                "  import ReplShow._",
                "  import ReplSession$0._",
                "  import Math._  (from ReplSession$0)"
            ]
        );
        session.execute(ReplCommand::Reset);
        assert_eq!(session.state(), &SessionState::new());
        assert!(!session.context().registry().contains("ReplSession$0"));
    }

    #[test]
    fn invalid_command_is_reported() {
        let mut session = ReplSession::new(Settings::default());
        let msgs = session.execute(ReplCommand::Invalid(":nope".into()));
        assert!(matches!(&msgs[0], ReplMsg::Err(s) if s.contains("コマンド形式が不正")));
    }

    struct Scripted(VecDeque<&'static str>);

    impl ReplLineSource for Scripted {
        fn read_line(&mut self, _prompt: &str) -> io::Result<ReadResult> {
            Ok(match self.0.pop_front() {
                Some(s) => ReadResult::Line(s.to_string()),
                None => ReadResult::Eof,
            })
        }
    }

    #[test]
    /// スクリプト駆動でループ全体を通す（複数行入力を含む）。
    fn run_repl_with_script_executes_commands() {
        let mut script = Scripted(
            vec![
                ":help",
                "def twice(n: Int): Int = {",
                "  n * 2",
                "}",
                "twice(21)",
                ":t twice",
                "1 +",
                ":quit",
                "never reached",
            ]
            .into(),
        );
        let mut out = Vec::new();
        let mut err = Vec::new();
        run_repl_with(&mut script, &mut out, &mut err, Settings::default()).unwrap();
        let stdout = String::from_utf8(out).unwrap();
        let stderr = String::from_utf8(err).unwrap();
        assert!(stdout.contains("利用可能なコマンド"));
        assert!(stdout.contains("def twice: Int => Int"));
        assert!(stdout.contains("val res0: Int"));
        assert!(stdout.contains("-- Int => Int"));
        assert!(stderr.contains("error: [PAR"));
        assert_eq!(script.0.len(), 1);
    }

    #[test]
    fn buf_read_source_strips_line_endings() {
        let mut src = BufReadSource::new("a\r\nb".as_bytes(), false);
        assert_eq!(src.read_line("> ").unwrap(), ReadResult::Line("a".into()));
        assert_eq!(src.read_line("> ").unwrap(), ReadResult::Line("b".into()));
        assert_eq!(src.read_line("> ").unwrap(), ReadResult::Eof);
    }
}
