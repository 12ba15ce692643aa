use super::events::EngineEvent;
use crate::error::EngineError;
use crate::invoker::{EndpointInvoker, Invocation, InvocationFailure, OperationPath};
use crate::scenario::{RepeatMode, RepeatSpec};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::warn;

/// 일시적 프로토콜 오류에 대한 최대 호출 시도 횟수이다.
pub const TRANSIENT_ATTEMPTS: u32 = 5;
/// 일시적 프로토콜 오류 재시도 사이의 고정 대기 시간이다.
pub const TRANSIENT_BACKOFF: Duration = Duration::from_millis(500);

/// 일시적 실패만 고정 간격으로 재시도하며 호출한다. 시도를 모두 소진하면 마지막 실패를 반환한다.
pub async fn invoke_with_retry(
    invoker: &dyn EndpointInvoker,
    operation: &OperationPath,
    args: &Map<String, Value>,
    sender: &UnboundedSender<EngineEvent>,
    step_id: &str,
) -> Result<Invocation, InvocationFailure> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match invoker.invoke(operation, args).await {
            Err(failure) if failure.is_transient() && attempt < TRANSIENT_ATTEMPTS => {
                warn!(%operation, attempt, detail = %failure.detail, "일시적 호출 오류, 재시도");
                let _ = sender.send(EngineEvent::StepLog {
                    step_id: step_id.to_string(),
                    line: format!(
                        "일시적 오류 발생, {}ms 후 재시도 ({attempt}/{TRANSIENT_ATTEMPTS})",
                        TRANSIENT_BACKOFF.as_millis()
                    ),
                });
                sleep(TRANSIENT_BACKOFF).await;
            }
            outcome => return outcome,
        }
    }
}

/// 한 번의 시도에서 관찰한 호출 결과이다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation<'a> {
    /// 응답 또는 실패의 상태 코드.
    pub status: Option<u16>,
    /// 응답 또는 실패의 메시지.
    pub message: Option<&'a str>,
}

/// 반복 여부 판단 결과이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDecision {
    /// 대기 후 다시 호출한다.
    Continue,
    /// 반복을 끝낸다.
    Stop,
}

/// `repeat` 지시자의 상태 기계이다.
#[derive(Debug, Clone, Copy)]
pub struct RepeatController<'a> {
    spec: &'a RepeatSpec,
}

impl<'a> RepeatController<'a> {
    /// 반복 구성을 받아 컨트롤러를 생성한다.
    pub fn new(spec: &'a RepeatSpec) -> Self {
        Self { spec }
    }

    /// 반복 사이 대기 시간을 반환한다.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.spec.delay.max(0.0))
    }

    /// 시도 한 번이 끝난 뒤 다시 호출할지 결정한다.
    ///
    /// # 매개변수
    /// - `times`: 지금까지 끝난 반복 횟수(첫 호출 후 0).
    /// - `observation`: 이번 시도의 상태/메시지.
    /// - `evaluate`: 조건식 하나를 평가하는 함수.
    pub fn decide<F>(
        &self,
        times: u32,
        observation: &Observation<'_>,
        mut evaluate: F,
    ) -> Result<RepeatDecision, EngineError>
    where
        F: FnMut(&str) -> Result<bool, EngineError>,
    {
        let conditions = &self.spec.conditions;
        let mut checks: Vec<bool> = Vec::new();
        if let Some(code) = conditions.code {
            checks.push(observation.status == Some(code));
        }
        if let Some(message) = conditions.message.as_deref() {
            checks.push(observation.message == Some(message));
        }
        let mut expressions = Vec::with_capacity(conditions.expression.len());
        for source in &conditions.expression {
            expressions.push(evaluate(source)?);
        }

        match self.spec.mode {
            RepeatMode::Loop => {
                if conditions.raise_exception {
                    let satisfied =
                        checks.iter().chain(expressions.iter()).all(|satisfied| *satisfied);
                    if !satisfied {
                        return Err(EngineError::RepeatCondition(describe(observation)));
                    }
                }
                if times + 1 >= self.spec.max {
                    Ok(RepeatDecision::Stop)
                } else {
                    Ok(RepeatDecision::Continue)
                }
            }
            RepeatMode::While => {
                let keep_going = checks.iter().all(|satisfied| *satisfied)
                    && expressions.iter().all(|satisfied| *satisfied);
                self.bounded(times, keep_going)
            }
            RepeatMode::Until => {
                let keep_going = checks.iter().all(|satisfied| !*satisfied)
                    && (expressions.is_empty() || expressions.iter().any(|satisfied| !*satisfied));
                self.bounded(times, keep_going)
            }
        }
    }

    fn bounded(&self, times: u32, keep_going: bool) -> Result<RepeatDecision, EngineError> {
        if !keep_going {
            return Ok(RepeatDecision::Stop);
        }
        if self.spec.max != 0 && times >= self.spec.max {
            return Err(EngineError::RetryExhausted { times });
        }
        Ok(RepeatDecision::Continue)
    }
}

fn describe(observation: &Observation<'_>) -> String {
    let status = observation
        .status
        .map_or_else(|| "없음".to_string(), |code| code.to_string());
    format!("상태: {status}, 메시지: {}", observation.message.unwrap_or("없음"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::RepeatConditions;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc::unbounded_channel;

    fn spec(mode: RepeatMode, max: u32, conditions: RepeatConditions) -> RepeatSpec {
        RepeatSpec {
            mode,
            delay: 0.0,
            max,
            conditions,
        }
    }

    fn status(code: u16) -> Observation<'static> {
        Observation {
            status: Some(code),
            message: None,
        }
    }

    fn no_expressions(_: &str) -> Result<bool, EngineError> {
        Ok(true)
    }

    #[test]
    fn loop_continues_twice_then_stops_regardless_of_conditions() {
        let spec = spec(RepeatMode::Loop, 3, RepeatConditions::default());
        let controller = RepeatController::new(&spec);
        let decisions: Vec<RepeatDecision> = [200, 500, 404]
            .iter()
            .enumerate()
            .map(|(times, code)| {
                controller
                    .decide(times as u32, &status(*code), no_expressions)
                    .expect("판단 실패")
            })
            .collect();
        assert_eq!(
            decisions,
            vec![RepeatDecision::Continue, RepeatDecision::Continue, RepeatDecision::Stop]
        );
    }

    #[test]
    fn loop_with_raise_exception_fails_on_mismatch() {
        let conditions = RepeatConditions {
            raise_exception: true,
            ..RepeatConditions::default()
        };
        let spec = spec(RepeatMode::Loop, 3, conditions);
        let err = RepeatController::new(&spec)
            .decide(0, &status(500), no_expressions)
            .expect_err("조건 불일치");
        assert!(matches!(err, EngineError::RepeatCondition(_)));
    }

    #[test]
    fn while_continues_on_matching_code_and_stops_on_mismatch() {
        let spec = spec(RepeatMode::While, 2, RepeatConditions::default());
        let controller = RepeatController::new(&spec);
        let mut decisions = Vec::new();
        for (times, code) in [200, 200, 404].into_iter().enumerate() {
            decisions.push(
                controller
                    .decide(times as u32, &status(code), no_expressions)
                    .expect("판단 실패"),
            );
        }
        assert_eq!(
            decisions,
            vec![RepeatDecision::Continue, RepeatDecision::Continue, RepeatDecision::Stop]
        );
    }

    #[test]
    fn while_exceeding_max_raises_retry_exhaustion() {
        let spec = spec(RepeatMode::While, 2, RepeatConditions::default());
        let controller = RepeatController::new(&spec);
        assert_eq!(
            controller.decide(0, &status(200), no_expressions).expect("판단 실패"),
            RepeatDecision::Continue
        );
        assert_eq!(
            controller.decide(1, &status(200), no_expressions).expect("판단 실패"),
            RepeatDecision::Continue
        );
        let err = controller
            .decide(2, &status(200), no_expressions)
            .expect_err("최대 횟수 초과");
        assert!(matches!(err, EngineError::RetryExhausted { times: 2 }));
    }

    #[test]
    fn zero_max_is_unbounded_for_while() {
        let spec = spec(RepeatMode::While, 0, RepeatConditions::default());
        let decision = RepeatController::new(&spec)
            .decide(1_000, &status(200), no_expressions)
            .expect("판단 실패");
        assert_eq!(decision, RepeatDecision::Continue);
    }

    #[test]
    fn until_stops_once_every_expression_holds() {
        let conditions = RepeatConditions {
            code: None,
            expression: vec!["ready".to_string(), "indexed".to_string()],
            ..RepeatConditions::default()
        };
        let spec = spec(RepeatMode::Until, 5, conditions);
        let controller = RepeatController::new(&spec);
        let partial = controller
            .decide(0, &status(200), |source| Ok(source == "ready"))
            .expect("판단 실패");
        assert_eq!(partial, RepeatDecision::Continue);
        let done = controller
            .decide(1, &status(200), |_| Ok(true))
            .expect("판단 실패");
        assert_eq!(done, RepeatDecision::Stop);
    }

    #[test]
    fn until_code_waits_for_target_status() {
        let spec = spec(RepeatMode::Until, 5, RepeatConditions::default());
        let controller = RepeatController::new(&spec);
        assert_eq!(
            controller.decide(0, &status(404), no_expressions).expect("판단 실패"),
            RepeatDecision::Continue
        );
        assert_eq!(
            controller.decide(1, &status(200), no_expressions).expect("판단 실패"),
            RepeatDecision::Stop
        );
    }

    #[test]
    fn message_condition_compares_failure_message() {
        let conditions = RepeatConditions {
            code: None,
            message: Some("notFound".to_string()),
            ..RepeatConditions::default()
        };
        let spec = spec(RepeatMode::While, 5, conditions);
        let controller = RepeatController::new(&spec);
        let observation = Observation {
            status: Some(404),
            message: Some("notFound"),
        };
        assert_eq!(
            controller.decide(0, &observation, no_expressions).expect("판단 실패"),
            RepeatDecision::Continue
        );
        assert_eq!(
            controller.decide(0, &status(200), no_expressions).expect("판단 실패"),
            RepeatDecision::Stop
        );
    }

    /// 정해진 횟수만큼 일시적 오류를 낸 뒤 성공하는 테스트용 Invoker이다.
    struct FlakyInvoker {
        failures: u32,
        calls: AtomicU32,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EndpointInvoker for FlakyInvoker {
        async fn invoke(
            &self,
            operation: &OperationPath,
            _args: &Map<String, Value>,
        ) -> Result<Invocation, InvocationFailure> {
            self.seen
                .lock()
                .expect("잠금 실패")
                .push(operation.to_string());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(InvocationFailure::transient(operation, "응답이 잘렸습니다"))
            } else {
                Ok(Invocation::ok(Value::from(call)))
            }
        }
    }

    fn flaky(failures: u32) -> FlakyInvoker {
        FlakyInvoker {
            failures,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_within_budget() {
        let invoker = flaky(3);
        let (sender, mut receiver) = unbounded_channel();
        let operation = OperationPath::parse("files.get").expect("경로");
        let outcome = invoke_with_retry(&invoker, &operation, &Map::new(), &sender, "s#1")
            .await
            .expect("재시도 후 성공");
        assert_eq!(outcome.result, Value::from(3));
        assert_eq!(invoker.seen.lock().expect("잠금 실패").len(), 4);
        let mut retries = 0;
        while let Ok(event) = receiver.try_recv() {
            if matches!(event, EngineEvent::StepLog { .. }) {
                retries += 1;
            }
        }
        assert_eq!(retries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_surfaces_last_failure() {
        let invoker = flaky(10);
        let (sender, _receiver) = unbounded_channel();
        let operation = OperationPath::parse("files.get").expect("경로");
        let failure = invoke_with_retry(&invoker, &operation, &Map::new(), &sender, "s#1")
            .await
            .expect_err("재시도 소진");
        assert!(failure.is_transient());
        assert_eq!(invoker.calls.load(Ordering::SeqCst), TRANSIENT_ATTEMPTS);
    }

    #[tokio::test]
    async fn rejected_failures_are_not_retried() {
        struct Rejecting;

        #[async_trait]
        impl EndpointInvoker for Rejecting {
            async fn invoke(
                &self,
                operation: &OperationPath,
                _args: &Map<String, Value>,
            ) -> Result<Invocation, InvocationFailure> {
                Err(InvocationFailure::rejected(operation, 404, "notFound"))
            }
        }

        let (sender, mut receiver) = unbounded_channel();
        let operation = OperationPath::parse("files.get").expect("경로");
        let failure = invoke_with_retry(&Rejecting, &operation, &Map::new(), &sender, "s#1")
            .await
            .expect_err("거부");
        assert_eq!(failure.status, Some(404));
        assert!(receiver.try_recv().is_err());
    }
}
