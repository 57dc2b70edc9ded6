// 同階層のファイルをモジュールとしてインポート
pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod openai;
pub mod repl;
pub mod subtask;
pub mod testing; // scripted transport / sink for tests

pub use app::App;
pub use config::{ChatConfig, ChatOptions, ReasoningEffort};
pub use display::{ConsoleSink, DisplaySink, NullSink};
pub use error::{ChatError, ChatResult};
pub use openai::{ChatAnswer, ChatClient, ChatStatus, Message, ToolRegistry};

// Ensure .env is loaded for tests before anything else runs in the test process.
#[cfg(test)]
#[ctor::ctor]
fn load_dotenv_for_tests() {
    let _ = dotenvy::dotenv();
}
