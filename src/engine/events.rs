/// 엔진에서 콘솔 리포터로 전달되는 주요 이벤트 모델이다.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// 시나리오 시작 알림.
    ScenarioStarted { name: String, commands: usize },
    /// 시나리오 건너뜀 알림.
    ScenarioSkipped { name: String },
    /// Command 시작 알림.
    StepStarted {
        step_id: String,
        operation: String,
        description: Option<String>,
    },
    /// Command별 로그 라인.
    StepLog { step_id: String, line: String },
    /// 검증 경로 하나의 판정.
    StepCheck {
        step_id: String,
        path: String,
        passed: bool,
    },
    /// 치명적이지 않은 검증 실패 또는 경고.
    StepWarning { step_id: String, message: String },
    /// Command 실패 요약.
    StepFailed {
        step_id: String,
        operation: String,
        message: String,
    },
    /// Command 종료 알림.
    StepFinished { step_id: String, success: bool },
    /// 시나리오 종료. 오류가 하나라도 있었으면 `error_occurred`가 참이다.
    ScenarioFinished { name: String, error_occurred: bool },
}
