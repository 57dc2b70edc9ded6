use criterion::{black_box, criterion_group, criterion_main, Criterion};
use toolchat::display::NullSink;
use toolchat::openai::call::{assemble_response, ChatChunk, StreamAssembler};
use toolchat::testing::{text_chunk, tool_call_chunk, tool_call_response};

/// 4 本のツール呼び出しを 1 文字ずつ流す + 本文 200 チャンク
fn fragmented_turn() -> Vec<ChatChunk> {
    let mut chunks = Vec::new();
    for i in 0..200 {
        chunks.push(text_chunk(if i % 2 == 0 { "tok " } else { "en " }));
    }
    for slot in 0..4u32 {
        let id = format!("call_{slot}");
        chunks.push(tool_call_chunk(slot, Some(&id), Some("calculate"), None));
        let args = r#"{"operation":"multiply","num1":123.5,"num2":77}"#;
        for ch in args.chars() {
            let piece = ch.to_string();
            chunks.push(tool_call_chunk(slot, None, None, Some(&piece)));
        }
    }
    chunks
}

fn criterion_benchmark(c: &mut Criterion) {
    let chunks = fragmented_turn();
    c.bench_function("stream assemble 4 calls", |b| {
        b.iter(|| {
            let mut asm = StreamAssembler::new();
            for chunk in &chunks {
                asm.push(chunk, &NullSink);
            }
            black_box(asm.finish())
        })
    });

    let response = tool_call_response(&[
        ("a", "calculate", r#"{"operation":"add","num1":1,"num2":2}"#),
        ("b", "get_current_time", "{}"),
    ]);
    c.bench_function("assemble complete response", |b| b.iter(|| black_box(assemble_response(&response))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
