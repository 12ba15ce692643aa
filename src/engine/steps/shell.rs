use super::super::events::EngineEvent;
use super::utils::{HookStream, log_step, pipe_forwarder};
use crate::error::EngineError;
use crate::scenario::ReferenceList;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

/// setup/teardown 훅 명령을 순서대로 실행하고 출력을 로그로 전달한다.
///
/// # 인자
/// - `commands`: 실행할 쉘 명령 목록
/// - `working_dir`: 명령을 실행할 디렉터리(시나리오 기준 디렉터리)
/// - `sender`: 로그 이벤트를 내보낼 채널 송신자
/// - `step_id`: 로그에 붙일 식별자
///
/// # 반환값
/// 모든 명령이 0으로 종료하면 `Ok(())`, 하나라도 실패하면 그 명령의 `Hook` 오류를 반환한다.
pub(crate) async fn run_hooks(
    commands: &ReferenceList,
    working_dir: &Path,
    sender: &UnboundedSender<EngineEvent>,
    step_id: &str,
) -> Result<(), EngineError> {
    for script in commands.iter() {
        run_shell_command(script, working_dir, sender, step_id).await?;
    }
    Ok(())
}

async fn run_shell_command(
    script: &str,
    working_dir: &Path,
    sender: &UnboundedSender<EngineEvent>,
    step_id: &str,
) -> Result<(), EngineError> {
    let hook_error = |reason: String| EngineError::Hook {
        command: script.to_string(),
        reason,
    };
    log_step(
        sender,
        step_id,
        &format!("훅 실행: {script} ({})", working_dir.display()),
    );
    let mut command = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.arg("/C");
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c");
        command
    };
    command.arg(script);
    if working_dir.is_dir() {
        command.current_dir(working_dir);
    }
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .map_err(|err| hook_error(format!("프로세스를 시작할 수 없습니다: {err}")))?;
    let mut forwarders = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        forwarders.push(tokio::spawn(pipe_forwarder(
            stdout,
            sender.clone(),
            step_id.to_string(),
            HookStream::Stdout,
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        forwarders.push(tokio::spawn(pipe_forwarder(
            stderr,
            sender.clone(),
            step_id.to_string(),
            HookStream::Stderr,
        )));
    }
    let status = child
        .wait()
        .await
        .map_err(|err| hook_error(format!("종료 대기 실패: {err}")))?;
    for forwarder in forwarders {
        let _ = forwarder.await;
    }
    if status.success() {
        Ok(())
    } else {
        Err(hook_error(format!("종료 코드: {status}")))
    }
}
