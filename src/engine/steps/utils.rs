use super::super::assertion::{CheckRecord, CheckReport};
use super::super::events::EngineEvent;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::codec::{FramedRead, LinesCodec};

/// Step 로그를 전송한다.
pub(super) fn log_step(sender: &UnboundedSender<EngineEvent>, step_id: &str, line: &str) {
    let _ = sender.send(EngineEvent::StepLog {
        step_id: step_id.to_string(),
        line: line.to_string(),
    });
}

/// 경고 메시지를 전송한다.
pub(super) fn warn_step(sender: &UnboundedSender<EngineEvent>, step_id: &str, message: &str) {
    let _ = sender.send(EngineEvent::StepWarning {
        step_id: step_id.to_string(),
        message: message.to_string(),
    });
}

/// 검증 기록을 순서대로 이벤트로 변환해 전송하고 기록을 비운다.
pub(super) fn emit_report(
    sender: &UnboundedSender<EngineEvent>,
    step_id: &str,
    report: &mut CheckReport,
) {
    for record in report.take_records() {
        let event = match record {
            CheckRecord::Status { path, passed } => EngineEvent::StepCheck {
                step_id: step_id.to_string(),
                path,
                passed,
            },
            CheckRecord::Failure { message, .. } => EngineEvent::StepWarning {
                step_id: step_id.to_string(),
                message,
            },
        };
        let _ = sender.send(event);
    }
}

/// 훅 프로세스의 출력 스트림이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HookStream {
    Stdout,
    Stderr,
}

impl HookStream {
    fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// 한 줄로 받아들일 훅 출력의 최대 길이(바이트)이다.
const MAX_HOOK_LINE: usize = 64 * 1024;

/// 훅 프로세스 파이프를 줄 단위로 읽어 이벤트로 중계한다.
///
/// 표준 출력은 Step 로그로, 표준 오류는 경고로 보낸다.
pub(super) async fn pipe_forwarder<R>(
    reader: R,
    sender: UnboundedSender<EngineEvent>,
    step_id: String,
    stream: HookStream,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let label = stream.label();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_HOOK_LINE));
    while let Some(line) = lines.next().await {
        match (line, stream) {
            (Ok(line), HookStream::Stdout) => {
                log_step(&sender, &step_id, &format!("[{label}] {line}"));
            }
            (Ok(line), HookStream::Stderr) => {
                warn_step(&sender, &step_id, &format!("[{label}] {line}"));
            }
            (Err(err), _) => {
                let message = format!("[{label}] 출력을 읽을 수 없습니다: {err}");
                warn_step(&sender, &step_id, &message);
                break;
            }
        }
    }
}
