use std::sync::Arc;
use color_eyre::eyre::eyre;
use rand::Rng;
use serde_json::{json, Value};
use crate::openai::tools::{ToolDefinition, ToolParametersBuilder, ToolRegistry};

/// 数値引数を取り出す（未指定なら default、数値でなければエラー）
fn number_arg(args: &Value, key: &str, default: Option<f64>) -> color_eyre::Result<f64> {
    match args.get(key) {
        Some(v) => v.as_f64().ok_or_else(|| eyre!("'{key}' must be a number, got {v}")),
        None => default.ok_or_else(|| eyre!("missing required parameter '{key}'")),
    }
}

/// 整数で表せる値は整数として返す（2+2 を 4.0 ではなく 4 にする）
fn number_value(x: f64) -> Value {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        json!(x as i64)
    } else {
        json!(x)
    }
}

/// min_value..=max_value の乱数整数を返すツール
pub fn build_random_number_tool() -> ToolDefinition {
    let params = ToolParametersBuilder::new_object()
        .add_number("min_value", Some("Lower bound (inclusive)"))
        .default_value("min_value", json!(0))
        .add_number("max_value", Some("Upper bound (inclusive)"))
        .default_value("max_value", json!(100))
        .build();
    ToolDefinition::new(
        "get_random_number",
        "Generate a random integer within the given range",
        params,
        Arc::new(|v| {
            let min = number_arg(v, "min_value", Some(0.0))?.ceil() as i64;
            let max = number_arg(v, "max_value", Some(100.0))?.floor() as i64;
            if min > max {
                return Err(eyre!("min_value ({min}) is greater than max_value ({max})"));
            }
            Ok(json!(rand::thread_rng().gen_range(min..=max)))
        }),
    )
}

/// 現在のローカル時刻を返すツール
pub fn build_current_time_tool() -> ToolDefinition {
    ToolDefinition::new(
        "get_current_time",
        "Get the current local date and time",
        ToolParametersBuilder::new_object().build(),
        Arc::new(|_v| Ok(json!(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()))),
    )
}

/// 四則演算ツール
pub fn build_calculate_tool() -> ToolDefinition {
    let params = ToolParametersBuilder::new_object()
        .add_string_enum("operation", Some("Operation type"), &["add", "subtract", "multiply", "divide"])
        .add_number("num1", Some("First operand"))
        .add_number("num2", Some("Second operand"))
        .required("operation")
        .required("num1")
        .required("num2")
        .build();
    ToolDefinition::new(
        "calculate",
        "Perform basic arithmetic (add, subtract, multiply, divide)",
        params,
        Arc::new(|v| {
            let op = v
                .get("operation")
                .and_then(|o| o.as_str())
                .ok_or_else(|| eyre!("missing required parameter 'operation'"))?;
            let a = number_arg(v, "num1", None)?;
            let b = number_arg(v, "num2", None)?;
            let result = match op {
                "add" => a + b,
                "subtract" => a - b,
                "multiply" => a * b,
                "divide" if b == 0.0 => return Err(eyre!("division by zero")),
                "divide" => a / b,
                other => return Err(eyre!("unsupported operation '{other}'")),
            };
            Ok(number_value(result))
        }),
    )
}

/// サンプルツール 3 種を登録したレジストリ
pub fn sample_registry() -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(build_random_number_tool())
        .register(build_current_time_tool())
        .register(build_calculate_tool());
    reg
}
