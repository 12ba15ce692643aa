use super::super::events::EngineEvent;
use super::super::expression::resolve;
use super::directives::PrintSpec;
use super::utils::{log_step, warn_step};
use crate::error::EngineError;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// 4칸 들여쓰기로 JSON을 보기 좋게 직렬화한다.
pub(super) fn pretty_json(value: &Value) -> String {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&buffer).to_string(),
        Err(_) => value.to_string(),
    }
}

/// `print_result`/`print_body` 지시자에 따라 값을 출력한다.
///
/// 하위 경로 해석에 실패하면 경고만 남기고 계속 진행한다.
pub(super) fn print_value(
    spec: &PrintSpec,
    label: &str,
    value: &Value,
    sender: &UnboundedSender<EngineEvent>,
    step_id: &str,
) {
    match spec {
        PrintSpec::Whole => {
            log_step(sender, step_id, &format!("{label} JSON:\n{}", pretty_json(value)));
        }
        PrintSpec::Paths(paths) => {
            for path in paths {
                match resolve(path, value) {
                    Ok(found) => log_step(
                        sender,
                        step_id,
                        &format!("{path}의 내용:\n{}", pretty_json(&found)),
                    ),
                    Err(err) => {
                        debug!(%path, error = %err, "출력 표현식 해석 실패");
                        warn_step(sender, step_id, &err.to_string());
                    }
                }
            }
        }
    }
}

/// 결과를 파일로 내보낸다.
pub(super) async fn export_result(path: &Path, value: &Value) -> Result<(), EngineError> {
    let io_error = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, pretty_json(value)).await.map_err(io_error)
}
