use crate::error::EngineError;
use crate::invoker::OperationPath;
use crate::scenario::{Hooks, OrderCriterion, RepeatSpec, parse_order_spec};
use serde_json::{Map, Value};
use std::time::Duration;

/// Operation 키와 구분되는 지시자 이름 목록이다.
const DIRECTIVES: [&str; 15] = [
    "save_result",
    "print_result",
    "print_body",
    "export_result",
    "check_result",
    "check_code",
    "check_message",
    "eval_expr",
    "pre_eval_expr",
    "repeat",
    "description",
    "check_order",
    "hooks",
    "post_delay",
    "config",
];

/// `print_result`/`print_body` 지시자이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PrintSpec {
    /// 값 전체를 출력한다.
    Whole,
    /// 하위 경로 표현식별로 출력한다.
    Paths(Vec<String>),
}

/// 지시자를 분리해 검증한 Command이다.
#[derive(Debug, Clone)]
pub(crate) struct CommandSpec {
    pub operation: OperationPath,
    pub args: Map<String, Value>,
    pub save_result: Option<String>,
    pub print_result: Option<PrintSpec>,
    pub print_body: Option<PrintSpec>,
    pub export_result: Option<String>,
    pub check_result: Option<Value>,
    pub check_code: Option<u16>,
    pub check_message: Option<String>,
    pub eval_expr: Vec<String>,
    pub pre_eval_expr: Vec<String>,
    pub repeat: Option<RepeatSpec>,
    pub description: Option<String>,
    pub check_order: Option<Vec<OrderCriterion>>,
    pub hooks: Hooks,
    pub post_delay: Option<Duration>,
    pub config: Option<Value>,
}

impl CommandSpec {
    /// 시나리오의 Command 값을 해석한다.
    ///
    /// 문자열이면 인자 없는 Command로 보고, 맵이면 지시자를 떼어 낸 뒤
    /// 남은 키가 정확히 하나인지 검증한다.
    pub fn parse(raw: &Value) -> Result<Self, EngineError> {
        match raw {
            Value::String(name) => Ok(Self::bare(parse_operation(name)?)),
            Value::Object(map) => Self::from_map(map),
            other => Err(EngineError::config(format!(
                "Command는 문자열 또는 맵이어야 합니다: {other}"
            ))),
        }
    }

    fn bare(operation: OperationPath) -> Self {
        Self {
            operation,
            args: Map::new(),
            save_result: None,
            print_result: None,
            print_body: None,
            export_result: None,
            check_result: None,
            check_code: None,
            check_message: None,
            eval_expr: Vec::new(),
            pre_eval_expr: Vec::new(),
            repeat: None,
            description: None,
            check_order: None,
            hooks: Hooks::default(),
            post_delay: None,
            config: None,
        }
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, EngineError> {
        let operations: Vec<(&String, &Value)> = map
            .iter()
            .filter(|(key, _)| !DIRECTIVES.contains(&key.as_str()))
            .collect();
        let [(name, args)] = operations.as_slice() else {
            let names: Vec<&str> = operations.iter().map(|(key, _)| key.as_str()).collect();
            return Err(EngineError::config(format!(
                "Command에는 Operation이 정확히 하나 있어야 합니다 (입력: {names:?})"
            )));
        };

        let mut spec = Self::bare(parse_operation(name)?);
        spec.args = match args {
            Value::Null => Map::new(),
            Value::Object(args) => args.clone(),
            other => {
                return Err(EngineError::config(format!(
                    "{name}의 인자는 맵이어야 합니다: {other}"
                )));
            }
        };
        for (key, value) in map.iter().filter(|(key, _)| DIRECTIVES.contains(&key.as_str())) {
            spec.apply(key, value)?;
        }
        Ok(spec)
    }

    fn apply(&mut self, key: &str, value: &Value) -> Result<(), EngineError> {
        match key {
            "save_result" => self.save_result = Some(string(key, value)?),
            "print_result" => self.print_result = print_spec(key, value)?,
            "print_body" => self.print_body = print_spec(key, value)?,
            "export_result" => self.export_result = Some(string(key, value)?),
            "check_result" => self.check_result = Some(value.clone()),
            "check_code" => self.check_code = Some(status_code(value)?),
            "check_message" => self.check_message = Some(string(key, value)?),
            "eval_expr" => self.eval_expr = strings(key, value)?,
            "pre_eval_expr" => self.pre_eval_expr = strings(key, value)?,
            "repeat" => {
                let repeat = serde_json::from_value(value.clone()).map_err(|err| {
                    EngineError::config(format!("repeat 형식이 잘못되었습니다: {err}"))
                })?;
                self.repeat = Some(repeat);
            }
            "description" => self.description = Some(string(key, value)?),
            "check_order" => self.check_order = Some(parse_order_spec(value)?),
            "hooks" => self.hooks = Hooks::from_value(value)?,
            "post_delay" => {
                let seconds = value
                    .as_f64()
                    .filter(|seconds| *seconds >= 0.0)
                    .ok_or_else(|| {
                        EngineError::config(format!("post_delay는 0 이상의 숫자여야 합니다: {value}"))
                    })?;
                self.post_delay = Some(Duration::from_secs_f64(seconds));
            }
            "config" => self.config = Some(value.clone()),
            _ => {}
        }
        Ok(())
    }
}

fn parse_operation(name: &str) -> Result<OperationPath, EngineError> {
    OperationPath::parse(name)
        .ok_or_else(|| EngineError::config(format!("Operation 경로가 잘못되었습니다: {name}")))
}

fn string(key: &str, value: &Value) -> Result<String, EngineError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EngineError::config(format!("{key}는 문자열이어야 합니다: {value}")))
}

fn strings(key: &str, value: &Value) -> Result<Vec<String>, EngineError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => Ok(vec![text.clone()]),
        Value::Array(items) => items.iter().map(|item| string(key, item)).collect(),
        other => Err(EngineError::config(format!(
            "{key}는 문자열 또는 문자열 목록이어야 합니다: {other}"
        ))),
    }
}

fn print_spec(key: &str, value: &Value) -> Result<Option<PrintSpec>, EngineError> {
    match value {
        Value::Bool(true) => Ok(Some(PrintSpec::Whole)),
        Value::Bool(false) | Value::Null => Ok(None),
        other => Ok(Some(PrintSpec::Paths(strings(key, other)?))),
    }
}

fn status_code(value: &Value) -> Result<u16, EngineError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| EngineError::config(format!("check_code가 올바른 상태 코드가 아닙니다: {value}")))
}
