use std::time::{Duration, Instant};

/// Command의 실행 결과 상태를 표현한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// 아직 실행 대기 상태.
    Pending,
    /// 정상 종료.
    Success,
    /// 검증은 끝났지만 실패한 경로가 있다.
    CheckFailed,
    /// 실패와 함께 오류 메시지를 포함한다.
    Failed(String),
}

impl StepStatus {
    /// 시나리오 오류로 집계해야 하는 상태인지 반환한다.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::CheckFailed | Self::Failed(_))
    }
}

/// Command 하나의 시간 및 상태 정보를 담는다.
#[derive(Debug, Clone)]
pub struct StepRuntimeState {
    /// Operation 경로 문자열.
    pub operation: String,
    /// 현재 상태 값.
    pub status: StepStatus,
    /// 반복 포함 호출 횟수.
    pub attempts: u32,
    /// 시작 시각.
    pub started_at: Instant,
    /// 종료 시각.
    pub finished_at: Option<Instant>,
}

impl StepRuntimeState {
    /// 시작 시점의 상태를 생성한다.
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: StepStatus::Pending,
            attempts: 0,
            started_at: Instant::now(),
            finished_at: None,
        }
    }

    /// 종료 상태를 기록한다.
    pub fn finish(&mut self, status: StepStatus) {
        self.status = status;
        self.finished_at = Some(Instant::now());
    }

    /// 소요 시간을 반환한다.
    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at)
    }
}

/// 시나리오 하나의 실행 요약이다.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRuntime {
    /// 시나리오 표시 이름.
    pub name: String,
    /// 실행 순서대로의 Command 상태.
    pub steps: Vec<StepRuntimeState>,
    /// 하위 시나리오 요약.
    pub imports: Vec<ScenarioRuntime>,
    /// 건너뛴 시나리오인지 여부.
    pub skipped: bool,
    /// 훅 등 Command 밖에서 발생한 오류.
    pub errors: Vec<String>,
}

impl ScenarioRuntime {
    /// 이름으로 빈 요약을 생성한다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 자기 자신 또는 하위 시나리오에 오류가 있었는지 반환한다.
    pub fn error_occurred(&self) -> bool {
        !self.errors.is_empty()
            || self.steps.iter().any(|step| step.status.is_error())
            || self.imports.iter().any(ScenarioRuntime::error_occurred)
    }

    /// 하위 시나리오를 포함한 실패 Command 수를 반환한다.
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|step| step.status.is_error()).count()
            + self.imports.iter().map(ScenarioRuntime::failed_steps).sum::<usize>()
    }

    /// 하위 시나리오를 포함한 전체 Command 수를 반환한다.
    pub fn total_steps(&self) -> usize {
        self.steps.len() + self.imports.iter().map(ScenarioRuntime::total_steps).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_in_imports_propagate_to_parent() {
        let mut child = ScenarioRuntime::new("child");
        let mut step = StepRuntimeState::start("files.get");
        step.finish(StepStatus::CheckFailed);
        child.steps.push(step);

        let mut parent = ScenarioRuntime::new("parent");
        let mut ok = StepRuntimeState::start("files.list");
        ok.finish(StepStatus::Success);
        parent.steps.push(ok);
        assert!(!parent.error_occurred());

        parent.imports.push(child);
        assert!(parent.error_occurred());
        assert_eq!(parent.failed_steps(), 1);
        assert_eq!(parent.total_steps(), 2);
    }
}
