use super::context::{RunContext, ScenarioScope};
use super::events::EngineEvent;
use super::state::{ScenarioRuntime, StepRuntimeState, StepStatus};
use super::steps::{CommandSpec, run_command, run_hooks};
use super::store::ResultStore;
use crate::scenario::{ReferenceList, ScenarioPlan, ServiceDescriptor};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info};

/// 시나리오 실행 결과이다.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 실행 요약.
    pub runtime: ScenarioRuntime,
    /// `exit_on_error`로 중간에 중단되었는지 여부.
    pub aborted: bool,
}

impl RunReport {
    /// 오류가 하나라도 발생했는지 반환한다.
    pub fn error_occurred(&self) -> bool {
        self.aborted || self.runtime.error_occurred()
    }
}

/// 실행 계획 전체를 순서대로 실행하고 이벤트를 송신한다.
///
/// setup 훅, setup Command, import 시나리오, 자기 Command, teardown Command, teardown 훅 순이다.
pub async fn run_scenario(plan: &ScenarioPlan, ctx: &RunContext) -> RunReport {
    run_plan(plan, None, ctx.options.exit_on_error, ctx).await
}

/// import 재귀를 위해 Box로 감싼 시나리오 실행 Future를 만든다.
fn run_plan<'a>(
    plan: &'a ScenarioPlan,
    inherited_service: Option<&'a ServiceDescriptor>,
    inherited_exit_on_error: bool,
    ctx: &'a RunContext,
) -> BoxFuture<'a, RunReport> {
    Box::pin(async move {
        let mut runtime = ScenarioRuntime::new(plan.name.clone());
        if plan.scenario.skip {
            info!(scenario = %plan.name, "skip 설정으로 건너뜀");
            runtime.skipped = true;
            let _ = ctx.sender.send(EngineEvent::ScenarioSkipped {
                name: plan.name.clone(),
            });
            return RunReport {
                runtime,
                aborted: false,
            };
        }
        let _ = ctx.sender.send(EngineEvent::ScenarioStarted {
            name: plan.name.clone(),
            commands: plan.command_count(),
        });

        let mut scope = ScenarioScope {
            name: plan.name.clone(),
            root: plan.root.clone(),
            service: plan
                .scenario
                .service
                .clone()
                .or_else(|| inherited_service.cloned()),
            store: ResultStore::new(),
            exit_on_error: plan.scenario.exit_on_error.unwrap_or(inherited_exit_on_error),
        };
        let mut runner = ScenarioRunner {
            ctx,
            runtime: &mut runtime,
            next_index: 0,
        };

        let mut aborted = false;
        if runner
            .run_hook(&plan.scenario.hooks.setup, &scope, "setup")
            .await
        {
            aborted = runner.run_body(plan, &mut scope).await;
        }
        runner
            .run_hook(&plan.scenario.hooks.teardown, &scope, "teardown")
            .await;

        debug!(scenario = %plan.name, saved = scope.store.len(), "시나리오 종료");
        let _ = ctx.sender.send(EngineEvent::ScenarioFinished {
            name: plan.name.clone(),
            error_occurred: aborted || runtime.error_occurred(),
        });
        RunReport { runtime, aborted }
    })
}

/// 시나리오 하나의 Command를 순서대로 실행하며 요약을 채운다.
struct ScenarioRunner<'a> {
    ctx: &'a RunContext,
    runtime: &'a mut ScenarioRuntime,
    next_index: usize,
}

impl ScenarioRunner<'_> {
    /// 본문을 실행한다. `exit_on_error`로 중단해야 하면 `true`를 반환한다.
    async fn run_body(&mut self, plan: &ScenarioPlan, scope: &mut ScenarioScope) -> bool {
        if self.run_commands(&plan.setup_commands, scope).await {
            return true;
        }
        for child in &plan.imports {
            let report = run_plan(child, scope.service.as_ref(), scope.exit_on_error, self.ctx).await;
            let aborted = report.aborted;
            self.runtime.imports.push(report.runtime);
            if aborted {
                return true;
            }
        }
        if self.run_commands(&plan.scenario.commands, scope).await {
            return true;
        }
        self.run_commands(&plan.teardown_commands, scope).await
    }

    async fn run_commands(&mut self, commands: &[Value], scope: &mut ScenarioScope) -> bool {
        for raw in commands {
            self.next_index += 1;
            let step_id = format!("{}#{}", scope.name, self.next_index);
            if self.run_step(&step_id, raw, scope).await && scope.exit_on_error {
                return true;
            }
        }
        false
    }

    /// Command 하나를 실행하고 상태를 기록한다. 오류가 있었으면 `true`를 반환한다.
    async fn run_step(&mut self, step_id: &str, raw: &Value, scope: &mut ScenarioScope) -> bool {
        let sender = &self.ctx.sender;
        let spec = match CommandSpec::parse(raw) {
            Ok(spec) => spec,
            Err(err) => {
                let operation = operation_label(raw);
                let mut state = StepRuntimeState::start(operation.clone());
                let _ = sender.send(EngineEvent::StepFailed {
                    step_id: step_id.to_string(),
                    operation,
                    message: err.to_string(),
                });
                state.finish(StepStatus::Failed(err.to_string()));
                self.runtime.steps.push(state);
                return true;
            }
        };
        let operation = spec.operation.to_string();
        let _ = sender.send(EngineEvent::StepStarted {
            step_id: step_id.to_string(),
            operation: operation.clone(),
            description: spec.description.clone(),
        });
        let mut state = StepRuntimeState::start(operation.clone());
        let status = match run_command(step_id, &spec, scope, self.ctx).await {
            Ok(outcome) => {
                state.attempts = outcome.attempts;
                if outcome.checks_passed {
                    StepStatus::Success
                } else {
                    StepStatus::CheckFailed
                }
            }
            Err(err) => {
                if self.ctx.options.debug {
                    debug!(step_id, error = ?err, "Command 실패 상세");
                }
                let _ = sender.send(EngineEvent::StepFailed {
                    step_id: step_id.to_string(),
                    operation,
                    message: err.to_string(),
                });
                if err.is_assertion() {
                    StepStatus::CheckFailed
                } else {
                    StepStatus::Failed(err.to_string())
                }
            }
        };
        let failed = status.is_error();
        let _ = sender.send(EngineEvent::StepFinished {
            step_id: step_id.to_string(),
            success: !failed,
        });
        state.finish(status);
        debug!(
            step_id,
            elapsed_ms = state.elapsed().as_millis() as u64,
            status = ?state.status,
            "Command 종료"
        );
        self.runtime.steps.push(state);
        failed
    }

    /// 시나리오 훅을 실행한다. 실패하면 오류를 기록하고 `false`를 반환한다.
    async fn run_hook(&mut self, hooks: &ReferenceList, scope: &ScenarioScope, phase: &str) -> bool {
        if hooks.is_empty() {
            return true;
        }
        let step_id = format!("{}:{phase}", scope.name);
        match run_hooks(hooks, &scope.root, &self.ctx.sender, &step_id).await {
            Ok(()) => true,
            Err(err) => {
                let _ = self.ctx.sender.send(EngineEvent::StepFailed {
                    step_id: step_id.clone(),
                    operation: format!("hooks.{phase}"),
                    message: err.to_string(),
                });
                self.runtime.errors.push(err.to_string());
                false
            }
        }
    }
}

/// 해석할 수 없는 Command의 표시 이름을 만든다.
fn operation_label(raw: &Value) -> String {
    match raw {
        Value::String(name) => name.clone(),
        Value::Object(map) => map.keys().next().cloned().unwrap_or_else(|| "?".to_string()),
        other => other.to_string(),
    }
}
