use crate::engine::EngineEvent;
use std::io::{self, Write};
use tokio::sync::mpsc::UnboundedReceiver;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// 요약에 남길 실패 항목이다.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FailureEntry {
    step_id: String,
    operation: String,
    message: String,
}

/// 엔진 이벤트를 콘솔 출력으로 바꾸는 리포터이다.
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
    failures: Vec<FailureEntry>,
    failed_checks: usize,
}

impl<W: Write> ConsoleReporter<W> {
    /// 출력 대상과 색상 사용 여부로 리포터를 생성한다.
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            failures: Vec::new(),
            failed_checks: 0,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// 이벤트 하나를 출력한다.
    pub fn handle(&mut self, event: &EngineEvent) -> io::Result<()> {
        match event {
            EngineEvent::ScenarioStarted { name, commands } => {
                let line = self.paint(BOLD, &format!("=== {name} (Command {commands}개) ==="));
                writeln!(self.out, "{line}")
            }
            EngineEvent::ScenarioSkipped { name } => {
                let line = self.paint(YELLOW, &format!("=== {name}: 건너뜀 ==="));
                writeln!(self.out, "{line}")
            }
            EngineEvent::StepStarted {
                step_id,
                operation,
                description,
            } => match description {
                Some(description) => writeln!(self.out, "[{step_id}] {operation} - {description}"),
                None => writeln!(self.out, "[{step_id}] {operation}"),
            },
            EngineEvent::StepLog { line, .. } => {
                for part in line.lines() {
                    writeln!(self.out, "    {part}")?;
                }
                Ok(())
            }
            EngineEvent::StepCheck { path, passed, .. } => {
                let line = if *passed {
                    self.paint(GREEN, &format!("    [통과] {path}"))
                } else {
                    self.failed_checks += 1;
                    self.paint(RED, &format!("    [실패] {path}"))
                };
                writeln!(self.out, "{line}")
            }
            EngineEvent::StepWarning { message, .. } => {
                let line = self.paint(YELLOW, &format!("    경고: {message}"));
                writeln!(self.out, "{line}")
            }
            EngineEvent::StepFailed {
                step_id,
                operation,
                message,
            } => {
                self.failures.push(FailureEntry {
                    step_id: step_id.clone(),
                    operation: operation.clone(),
                    message: message.clone(),
                });
                let line = self.paint(RED, &format!("    오류: {message}"));
                writeln!(self.out, "{line}")
            }
            EngineEvent::StepFinished { success, .. } => {
                let line = if *success {
                    self.paint(GREEN, "    완료")
                } else {
                    self.paint(RED, "    실패")
                };
                writeln!(self.out, "{line}")
            }
            EngineEvent::ScenarioFinished {
                name,
                error_occurred,
            } => {
                let line = if *error_occurred {
                    self.paint(RED, &format!("=== {name}: 오류 발생 ==="))
                } else {
                    self.paint(GREEN, &format!("=== {name}: 성공 ==="))
                };
                writeln!(self.out, "{line}")
            }
        }
    }

    /// 실패 요약을 출력하고 출력 대상을 돌려준다.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.failures.is_empty() || self.failed_checks > 0 {
            let title = self.paint(RED, "오류 요약");
            writeln!(self.out, "\n{title}")?;
            for failure in &self.failures {
                writeln!(
                    self.out,
                    "- [{}] {}: {}",
                    failure.step_id, failure.operation, failure.message
                )?;
            }
            if self.failed_checks > 0 {
                writeln!(self.out, "- 실패한 검증 경로 {}개", self.failed_checks)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// 채널이 닫힐 때까지 이벤트를 출력하고 요약으로 마무리한다.
pub async fn drain_events<W: Write>(
    mut receiver: UnboundedReceiver<EngineEvent>,
    mut reporter: ConsoleReporter<W>,
) -> io::Result<W> {
    while let Some(event) = receiver.recv().await {
        reporter.handle(&event)?;
    }
    reporter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn failures_are_listed_in_the_summary() {
        let (sender, receiver) = unbounded_channel();
        let events = [
            EngineEvent::ScenarioStarted {
                name: "drive".to_string(),
                commands: 1,
            },
            EngineEvent::StepStarted {
                step_id: "drive#1".to_string(),
                operation: "files.get".to_string(),
                description: Some("파일 조회".to_string()),
            },
            EngineEvent::StepLog {
                step_id: "drive#1".to_string(),
                line: "Result JSON:\n{}".to_string(),
            },
            EngineEvent::StepFailed {
                step_id: "drive#1".to_string(),
                operation: "files.get".to_string(),
                message: "404".to_string(),
            },
            EngineEvent::StepFinished {
                step_id: "drive#1".to_string(),
                success: false,
            },
            EngineEvent::ScenarioFinished {
                name: "drive".to_string(),
                error_occurred: true,
            },
        ];
        for event in events {
            sender.send(event).expect("전송 실패");
        }
        drop(sender);

        let out = drain_events(receiver, ConsoleReporter::new(Vec::new(), false))
            .await
            .expect("출력 실패");
        let text = String::from_utf8(out).expect("UTF-8");
        assert!(text.contains("[drive#1] files.get - 파일 조회"));
        assert!(text.contains("    Result JSON:\n    {}\n"));
        assert!(text.contains("=== drive: 오류 발생 ==="));
        assert!(text.ends_with("오류 요약\n- [drive#1] files.get: 404\n"));
    }

    #[test]
    fn successful_run_has_no_summary() {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        reporter
            .handle(&EngineEvent::StepCheck {
                step_id: "s#1".to_string(),
                path: "items".to_string(),
                passed: true,
            })
            .expect("출력 실패");
        let text = String::from_utf8(reporter.finish().expect("출력 실패")).expect("UTF-8");
        assert_eq!(text, "    [통과] items\n");
    }
}
