use super::assertion::{CheckReport, JsonChecker};
use super::context::{RunContext, ScenarioScope};
use super::expression::{resolve_list, substitute};
use super::order::check_order;
use super::repeat::{Observation, RepeatController, RepeatDecision, invoke_with_retry};
use super::resources::apply_config_override;
use super::transform::{Namespace, is_truthy};
use crate::error::EngineError;
use crate::invoker::SharedInvoker;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tokio::time::sleep;
use tracing::debug;

mod arguments;
mod directives;
mod output;
mod shell;
mod utils;

pub(crate) use directives::CommandSpec;
pub(crate) use shell::run_hooks;

use arguments::{load_document, resolve_arguments};
use output::{export_result, print_value};
use utils::{emit_report, log_step};

/// Command 하나의 실행 결과이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StepOutcome {
    /// 모든 검증 경로가 통과했는지 여부.
    pub checks_passed: bool,
    /// 반복을 포함한 호출 횟수.
    pub attempts: u32,
}

/// 한 번의 호출 뒤 후처리까지 마친 값이다.
struct Attempt {
    status: Option<u16>,
    message: Option<String>,
    result: Value,
}

/// Command 하나를 실행한다.
///
/// 호출, 후처리 지시자, 반복 판단, 결과/정렬 검증, Step 훅, `post_delay` 순으로 진행한다.
pub(crate) async fn run_command(
    step_id: &str,
    spec: &CommandSpec,
    scope: &mut ScenarioScope,
    ctx: &RunContext,
) -> Result<StepOutcome, EngineError> {
    let invoker = step_invoker(spec, scope, ctx)?;
    run_hooks(&spec.hooks.setup, &scope.root, &ctx.sender, step_id).await?;

    let controller = spec.repeat.as_ref().map(RepeatController::new);
    let mut times: u32 = 0;
    let result = loop {
        let attempt = invoke_once(step_id, spec, &invoker, scope, ctx, controller.is_some()).await?;
        let Some(controller) = controller else {
            break attempt.result;
        };
        let observation = Observation {
            status: attempt.status,
            message: attempt.message.as_deref(),
        };
        let decision = controller.decide(times, &observation, |source| {
            let namespace = Namespace::for_result(attempt.result.clone(), &scope.store);
            ctx.transforms.evaluate_condition(source, &namespace)
        })?;
        if decision == RepeatDecision::Stop {
            break attempt.result;
        }
        times += 1;
        log_step(
            &ctx.sender,
            step_id,
            &format!("반복 {times}회차, {:.1}초 대기", controller.delay().as_secs_f64()),
        );
        sleep(controller.delay()).await;
    };

    let mut checks_passed = true;
    let strict = scope.exit_on_error;
    if let Some(pattern) = &spec.check_result {
        let pattern = load_pattern(pattern, &scope.root).await?;
        let pattern = substitute(&pattern, scope.store.as_value())?;
        let mut checker = JsonChecker::new(strict);
        let outcome = checker.check(&result, &pattern);
        let mut report = checker.into_report();
        emit_report(&ctx.sender, step_id, &mut report);
        checks_passed &= outcome?;
    }
    if let Some(criteria) = &spec.check_order {
        let mut values = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            values.push(resolve_list(&criterion.expression, &result)?);
        }
        let directions: Vec<&str> = criteria.iter().map(|c| c.direction.as_str()).collect();
        let paths: Vec<&str> = criteria.iter().map(|c| c.expression.as_str()).collect();
        let mut report = CheckReport::new(strict);
        let outcome = check_order(&values, &directions, &paths, &mut report);
        emit_report(&ctx.sender, step_id, &mut report);
        checks_passed &= outcome?;
    }

    run_hooks(&spec.hooks.teardown, &scope.root, &ctx.sender, step_id).await?;
    if let Some(delay) = spec.post_delay {
        debug!(step_id, ?delay, "post_delay 대기");
        sleep(delay).await;
    }
    Ok(StepOutcome {
        checks_passed,
        attempts: times + 1,
    })
}

/// `config` 지시자가 있으면 이 Step 전용 Invoker를, 없으면 시나리오 기본 Invoker를 반환한다.
fn step_invoker(
    spec: &CommandSpec,
    scope: &ScenarioScope,
    ctx: &RunContext,
) -> Result<SharedInvoker, EngineError> {
    match &spec.config {
        Some(config) => {
            let base = scope.service.clone().unwrap_or_default();
            let (service, auth) =
                apply_config_override(&base, ctx.auth.as_ref(), config, &scope.store)?;
            ctx.registry.resolve(&service, auth.as_ref())
        }
        None => scope.default_invoker(ctx),
    }
}

/// 인자를 해석해 한 번 호출하고 호출 후 지시자를 적용한다.
async fn invoke_once(
    step_id: &str,
    spec: &CommandSpec,
    invoker: &SharedInvoker,
    scope: &mut ScenarioScope,
    ctx: &RunContext,
    repeating: bool,
) -> Result<Attempt, EngineError> {
    let resolved = resolve_arguments(spec, &scope.store, &scope.root, &ctx.transforms).await?;
    let started = Instant::now();
    let outcome =
        invoke_with_retry(invoker.as_ref(), &spec.operation, &resolved.args, &ctx.sender, step_id)
            .await;
    log_step(
        &ctx.sender,
        step_id,
        &format!("{}ms 소요", started.elapsed().as_millis()),
    );

    let (status, message, mut result) = match outcome {
        Ok(invocation) => (Some(invocation.status), invocation.message, invocation.result),
        Err(failure) => {
            let expected = spec.check_code.is_some() && failure.status == spec.check_code;
            if !expected && (!repeating || failure.is_transient()) {
                return Err(failure.into());
            }
            debug!(step_id, status = ?failure.status, "호출 실패를 예상된 결과로 처리");
            (failure.status, failure.message, Value::Null)
        }
    };

    if let Some(expected) = spec.check_code {
        if status != Some(expected) && !repeating {
            return Err(EngineError::Assertion {
                path: "check_code".to_string(),
                message: format!(
                    "상태 코드가 {expected}이어야 하지만 {}입니다.",
                    status.map_or_else(|| "없음".to_string(), |code| code.to_string())
                ),
            });
        }
        if expected != 200 && (200..300).contains(&expected) {
            result = Value::Null;
        }
    }
    if let Some(expected) = &spec.check_message {
        if message.as_deref() != Some(expected.as_str()) {
            return Err(EngineError::Assertion {
                path: "check_message".to_string(),
                message: format!(
                    "메시지가 \"{expected}\"이어야 하지만 \"{}\"입니다.",
                    message.as_deref().unwrap_or_default()
                ),
            });
        }
    }
    if !spec.eval_expr.is_empty() {
        let mut namespace = Namespace::for_result(result, &scope.store);
        ctx.transforms.run_statements(&spec.eval_expr, &mut namespace)?;
        result = namespace.take("result");
    }
    if let Some(name) = &spec.save_result {
        if is_truthy(&result) {
            if scope.store.contains(name) {
                debug!(step_id, name = %name, "저장된 결과를 덮어씀");
            }
            scope.store.insert(name.clone(), result.clone());
        }
    }
    if let Some(path) = &spec.export_result {
        export_result(Path::new(path), &result).await?;
        log_step(&ctx.sender, step_id, &format!("결과를 {path}에 저장했습니다."));
    }
    if let Some(print) = &spec.print_result {
        print_value(print, "Result", &result, &ctx.sender, step_id);
    }
    if let (Some(print), Some(body)) = (&spec.print_body, &resolved.body) {
        print_value(print, "Body", body, &ctx.sender, step_id);
    }
    Ok(Attempt {
        status,
        message,
        result,
    })
}

/// `check_result` 값을 패턴으로 바꾼다.
///
/// 문자열은 시나리오 디렉터리 기준 패턴 파일 경로이며 파일이 없으면 구성 오류이다.
/// 그 밖의 값은 그대로 패턴으로 사용한다.
async fn load_pattern(raw: &Value, root: &Path) -> Result<Value, EngineError> {
    match raw {
        Value::String(reference) => load_document(&root.join(reference)).await,
        other => Ok(other.clone()),
    }
}
