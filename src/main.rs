use std::sync::Arc;

use color_eyre::Result;
use toolchat::openai::Message;
use toolchat::repl::{print_answer, run_repl, MultiTurnChat};
use toolchat::{App, ChatConfig, ConsoleSink};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Load .env (optional). If the file doesn't exist, ignore the error.
    let _ = dotenvy::dotenv();

    // ログ: 標準出力は回答表示に使うので、ファイルへのみ出力する
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // ファイルにANSIカラー不要
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    let config = ChatConfig::from_env()?;
    let app = App::build(&config, tokio::runtime::Handle::current())?;
    let client = app.client.clone().with_sink(Arc::new(ConsoleSink::new()));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        // ワンショット: 引数をつないだプロンプトをストリーミングで 1 回だけ実行
        let options = app.options.clone().with_stream(true);
        let answer = client.chat(vec![Message::user(args.join(" "))], &app.tools, &options).await?;
        print_answer(&answer, options.stream);
        return Ok(());
    }

    let streamed = app.options.stream;
    let mut chat = MultiTurnChat::new(client, app.tools, app.options).with_echo_tool_calls(true);
    run_repl(&mut chat, streamed).await?;
    Ok(())
}
