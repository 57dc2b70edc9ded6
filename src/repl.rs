//! 複数ターン対話（REPL）
//!
//! 履歴はターンをまたいで保持する。`/` で始まる入力はコマンドとして扱う。

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::ChatOptions;
use crate::error::ChatResult;
use crate::openai::call::{ChatAnswer, ChatClient, ChatLogEvent, ConversationState};
use crate::openai::history::ConversationHistory;
use crate::openai::message::Role;
use crate::openai::tools::ToolDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History,
    Tools,
    Clear,
    Exit,
    Unknown(String),
}

/// `/xxx` 形式ならコマンドを返す。それ以外（通常の発話）は `None`
pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let word = trimmed.strip_prefix('/')?.split_whitespace().next().unwrap_or("");
    let cmd = match word.to_ascii_lowercase().as_str() {
        "help" | "h" => Command::Help,
        "history" => Command::History,
        "tools" => Command::Tools,
        "clear" => Command::Clear,
        "exit" | "quit" | "q" => Command::Exit,
        _ => Command::Unknown(trimmed.to_string()),
    };
    Some(cmd)
}

pub fn help_text() -> String {
    [
        "commands:",
        "  /help     show this help",
        "  /history  show the conversation so far",
        "  /tools    list the tools the model can call",
        "  /clear    forget the conversation",
        "  /exit     quit",
        "anything else is sent to the model",
    ]
    .join("\n")
}

pub fn render_history(history: &ConversationHistory) -> String {
    if history.is_empty() {
        return "(history is empty)".to_string();
    }
    let mut out = format!("{} messages", history.len());
    for (i, msg) in history.as_slice().iter().enumerate() {
        let n = i + 1;
        match msg.role {
            Role::Tool => {
                let name = msg.name.as_deref().unwrap_or("?");
                out.push_str(&format!("\n[{n}] tool ({name}): {}", msg.text()));
            }
            Role::Assistant if msg.has_tool_calls() => {
                out.push_str(&format!("\n[{n}] assistant: {}", msg.text()));
                for call in &msg.tool_calls {
                    out.push_str(&format!("\n      -> {}({})", call.name, call.arguments));
                }
            }
            role => out.push_str(&format!("\n[{n}] {role}: {}", msg.text())),
        }
    }
    out
}

pub fn render_tools(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "(no tools)".to_string();
    }
    tools
        .iter()
        .map(|t| format!("  {:<20} {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 1 行処理した結果
#[derive(Debug)]
pub enum ReplAction {
    Print(String),
    Answer(ChatAnswer),
    Exit,
    Nothing,
}

pub struct MultiTurnChat {
    client: ChatClient,
    tools: Vec<ToolDescriptor>,
    state: ConversationState,
    /// ツール呼び出しを標準出力に表示するか
    echo_tool_calls: bool,
}

impl MultiTurnChat {
    pub fn new(client: ChatClient, tools: Vec<ToolDescriptor>, options: ChatOptions) -> Self {
        Self {
            client,
            tools,
            state: ConversationState::new(Vec::new(), options),
            echo_tool_calls: false,
        }
    }

    pub fn with_echo_tool_calls(mut self, echo: bool) -> Self {
        self.echo_tool_calls = echo;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.state.history
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// ユーザー発話を 1 ターン分送る。ツール上限はターンごとに数え直す。
    ///
    /// 上限で打ち切られたターンは、残った tool_calls に未実行のエラー結果を付けてから返す。
    /// そうしないと次のターンで assistant(tool_calls) の直後に user が来てしまう。
    pub async fn send(&mut self, input: &str) -> ChatResult<ChatAnswer> {
        self.state.history.add_user(input);
        self.state.reset_iterations();
        let echo = self.echo_tool_calls;
        let answer = self
            .client
            .run_with_logger(&mut self.state, &self.tools, move |ev| {
                if let (true, ChatLogEvent::ToolCall { call, .. }) = (echo, ev) {
                    println!("  -> {}({})", call.name, call.arguments);
                }
            })
            .await?;
        if answer.is_iteration_limit_exceeded() {
            let closed = self.state.close_pending_tool_calls("iteration limit reached");
            info!(target: "repl", closed = closed.len(), "turn_stopped_at_limit");
        }
        Ok(answer)
    }

    pub async fn handle_line(&mut self, line: &str) -> ChatResult<ReplAction> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ReplAction::Nothing);
        }
        match parse_command(line) {
            Some(Command::Help) => Ok(ReplAction::Print(help_text())),
            Some(Command::History) => Ok(ReplAction::Print(render_history(&self.state.history))),
            Some(Command::Tools) => Ok(ReplAction::Print(render_tools(&self.tools))),
            Some(Command::Clear) => {
                self.state.history.clear();
                info!(target: "repl", "history_cleared");
                Ok(ReplAction::Print("history cleared".to_string()))
            }
            Some(Command::Exit) => Ok(ReplAction::Exit),
            Some(Command::Unknown(raw)) => Ok(ReplAction::Print(format!("unknown command: {raw} (try /help)"))),
            None => self.send(line).await.map(ReplAction::Answer),
        }
    }
}

/// 最終回答を表示する。ストリーミング時は本文が既に出ているので警告だけ出す。
pub fn print_answer(answer: &ChatAnswer, streamed: bool) {
    if !streamed && !answer.final_answer.is_empty() {
        println!("{}", answer.final_answer);
    }
    if answer.is_iteration_limit_exceeded() {
        println!("[warning] stopped after {} tool rounds; the answer may be incomplete", answer.tool_rounds);
    }
}

/// 標準入力から 1 行ずつ読み、`/exit` か EOF まで回す
pub async fn run_repl(chat: &mut MultiTurnChat, streamed: bool) -> ChatResult<()> {
    run_repl_from(chat, BufReader::new(tokio::io::stdin()), streamed).await
}

/// 任意の入力から回す（テストではバイト列を渡す）
pub async fn run_repl_from<R>(chat: &mut MultiTurnChat, input: R, streamed: bool) -> ChatResult<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("{}", help_text());
    println!("{} tools available", chat.tools().len());
    let mut lines = input.lines();
    loop {
        print!("\n> ");
        let _ = io::stdout().flush();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(target: "repl", error = %e, "stdin_read_failed");
                break;
            }
        };
        match chat.handle_line(&line).await {
            Ok(ReplAction::Print(text)) => println!("{text}"),
            Ok(ReplAction::Answer(answer)) => print_answer(&answer, streamed),
            Ok(ReplAction::Exit) => break,
            Ok(ReplAction::Nothing) => {}
            // 通信エラーでも REPL は継続する
            Err(e) => {
                warn!(target: "repl", error = %e, "turn_failed");
                println!("[error] {e}");
            }
        }
    }
    info!(target: "repl", messages = chat.history().len(), "repl_finished");
    Ok(())
}
