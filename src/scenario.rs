use crate::error::EngineError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;

mod plan;
mod yaml;

pub use plan::{ScenarioPlan, plan_scenario, plan_scenario_from_reader};
pub use yaml::yaml_to_json;

/// 호출 대상 서비스를 기술한다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// API 이름.
    #[serde(default)]
    pub api: String,
    /// API 버전.
    #[serde(default)]
    pub version: String,
    /// 디스커버리 문서 주소.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_url: Option<String>,
    /// 전송 구현에 전달할 추가 필드.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 인증 정보를 기술한다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 호출 주체 계정.
    #[serde(default)]
    pub email: String,
    /// OAuth 스코프(문자열 또는 목록).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_scope: Option<Value>,
    /// 클라이언트 비밀키 파일 경로.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// 클라이언트 ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// 자격 증명 구현에 전달할 추가 필드.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 문자열 하나 또는 문자열 목록을 모두 받아들이는 참조 목록이다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceList(pub Vec<String>);

impl ReferenceList {
    /// 참조가 비어 있는지 여부를 반환한다.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 참조 목록을 순회한다.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for ReferenceList {
    /// 문자열, 목록, null 형태의 설정을 모두 지원하도록 역직렬화한다.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Single(String),
            Many(Vec<String>),
            Empty(()),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Single(value) => Ok(ReferenceList(vec![value])),
            Helper::Many(values) => Ok(ReferenceList(values)),
            Helper::Empty(()) => Ok(ReferenceList::default()),
        }
    }
}

/// setup/teardown 쉘 훅 구성이다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hooks {
    /// 실행 전 수행할 쉘 명령 목록.
    #[serde(default)]
    pub setup: ReferenceList,
    /// 실행 후 수행할 쉘 명령 목록.
    #[serde(default)]
    pub teardown: ReferenceList,
}

impl Hooks {
    /// `hooks` 값을 해석한다. 형태가 잘못되면 구성 오류를 반환한다.
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|err| EngineError::config(format!("hooks 형식이 잘못되었습니다: {err}")))
    }
}

/// Scenario는 하나의 서비스에 대해 순서대로 실행할 Command 정의다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// 시나리오의 표시 이름.
    #[serde(default)]
    pub name: Option<String>,
    /// 대상 서비스 기술자. 없으면 상위 시나리오의 값을 사용한다.
    #[serde(default)]
    pub service: Option<ServiceDescriptor>,
    /// Command 목록. 각 항목은 맵 또는 Operation 이름 문자열이다.
    #[serde(default)]
    pub commands: Vec<Value>,
    /// 앞에 붙일 setup 시나리오 참조.
    #[serde(default)]
    pub setup: ReferenceList,
    /// 먼저 실행할 하위 시나리오 참조.
    #[serde(default)]
    pub import: ReferenceList,
    /// 뒤에 붙일 teardown 시나리오 참조.
    #[serde(default)]
    pub teardown: ReferenceList,
    /// 시나리오 단위 쉘 훅.
    #[serde(default)]
    pub hooks: Hooks,
    /// 실행을 건너뛸지 여부.
    #[serde(default)]
    pub skip: bool,
    /// import로 실행될 때 실패 시 상위 실행도 중단할지 여부.
    #[serde(default)]
    pub exit_on_error: Option<bool>,
}

impl Scenario {
    /// 표시용 이름을 반환한다.
    pub fn display_name(&self, fallback: &str) -> String {
        self.name.clone().unwrap_or_else(|| fallback.to_string())
    }

    /// Command 수를 반환한다.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Command가 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// 반복 모드를 표현한다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// 조건이 만족되는 동안 반복한다.
    #[default]
    While,
    /// 조건이 만족될 때까지 반복한다.
    Until,
    /// 조건과 무관하게 정해진 횟수만큼 반복한다.
    Loop,
}

/// 반복 판단에 사용하는 조건 묶음이다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatConditions {
    /// 비교할 상태 코드. `null`이면 비교하지 않는다.
    #[serde(default = "default_repeat_code")]
    pub code: Option<u16>,
    /// 비교할 오류 메시지.
    #[serde(default)]
    pub message: Option<String>,
    /// 불리언을 돌려주는 조건식 목록.
    #[serde(default, deserialize_with = "one_or_many")]
    pub expression: Vec<String>,
    /// loop 모드에서 조건 불일치를 오류로 처리할지 여부.
    #[serde(default)]
    pub raise_exception: bool,
}

impl Default for RepeatConditions {
    /// 기본 조건은 상태 코드 200 비교이다.
    fn default() -> Self {
        Self {
            code: default_repeat_code(),
            message: None,
            expression: Vec::new(),
            raise_exception: false,
        }
    }
}

/// Command의 `repeat` 지시자 구성이다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatSpec {
    /// 반복 모드.
    #[serde(default)]
    pub mode: RepeatMode,
    /// 반복 사이 대기 시간(초).
    #[serde(default = "default_repeat_delay")]
    pub delay: f64,
    /// 최대 반복 횟수. 0이면 while/until에서 무제한이다.
    #[serde(default = "default_repeat_max")]
    pub max: u32,
    /// 반복 조건.
    #[serde(default)]
    pub conditions: RepeatConditions,
}

impl Default for RepeatSpec {
    fn default() -> Self {
        Self {
            mode: RepeatMode::default(),
            delay: default_repeat_delay(),
            max: default_repeat_max(),
            conditions: RepeatConditions::default(),
        }
    }
}

/// 정렬 검증 기준 하나를 표현한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCriterion {
    /// 값 목록을 추출할 표현식.
    pub expression: String,
    /// 정렬 방향 문자열(`asc` 또는 `desc`).
    pub direction: String,
}

/// `check_order` 값을 기준 목록으로 변환한다.
///
/// `[{expr: dir}, ...]` 목록과 여러 키를 가진 단일 맵을 모두 받아들이며 선언 순서를 유지한다.
pub fn parse_order_spec(value: &Value) -> Result<Vec<OrderCriterion>, EngineError> {
    let entries: Vec<&Map<String, Value>> = match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    EngineError::config(format!("check_order 항목은 맵이어야 합니다: {item}"))
                })
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(EngineError::config(format!(
                "check_order 형식이 잘못되었습니다: {other}"
            )));
        }
    };
    let mut criteria = Vec::new();
    for map in entries {
        for (expression, direction) in map {
            let direction = direction.as_str().ok_or_else(|| {
                EngineError::config(format!("정렬 방향은 문자열이어야 합니다: {direction}"))
            })?;
            criteria.push(OrderCriterion {
                expression: expression.clone(),
                direction: direction.to_string(),
            });
        }
    }
    if criteria.is_empty() {
        return Err(EngineError::config("check_order에 기준이 없습니다."));
    }
    Ok(criteria)
}

/// `--auth` 파일로 전달되는 실행기 구성이다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// 기본 인증 정보.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    /// 디버그 로그 출력 여부.
    #[serde(default)]
    pub debug: bool,
    /// 첫 오류에서 실행을 중단할지 여부.
    #[serde(default)]
    pub exit_on_error: bool,
}

fn default_repeat_code() -> Option<u16> {
    Some(200)
}

fn default_repeat_delay() -> f64 {
    1.0
}

fn default_repeat_max() -> u32 {
    5
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Single(String),
        Many(Vec<String>),
        Empty(()),
    }

    match Helper::deserialize(deserializer) {
        Ok(Helper::Single(value)) => Ok(vec![value]),
        Ok(Helper::Many(values)) => Ok(values),
        Ok(Helper::Empty(())) => Ok(Vec::new()),
        Err(_) => Err(de::Error::custom(
            "expression은 문자열 또는 문자열 목록이어야 합니다",
        )),
    }
}

/// YAML 파일을 읽어 Scenario로 역직렬화한다.
pub fn load_scenario_from_file(path: &Path) -> anyhow::Result<Scenario> {
    let mut file = File::open(path)?;
    load_scenario_from_reader(&mut file)
}

/// Reader에서 YAML을 읽어 Scenario 구조체로 파싱한다.
pub fn load_scenario_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<Scenario> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&buf)?;
    let document = yaml_to_json(raw)?;
    let has_commands = document
        .as_object()
        .is_some_and(|map| map.contains_key("commands"));
    if !has_commands {
        return Err(EngineError::config("시나리오 파일에는 `commands` 섹션이 있어야 합니다.").into());
    }
    let scenario: Scenario = serde_json::from_value(document)?;
    Ok(scenario)
}

/// `--auth` 구성 파일을 읽는다.
pub fn load_runner_config(path: &Path) -> anyhow::Result<RunnerConfig> {
    let mut buf = String::new();
    File::open(path)?.read_to_string(&mut buf)?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&buf)?;
    if raw.is_null() {
        return Ok(RunnerConfig::default());
    }
    Ok(serde_json::from_value(yaml_to_json(raw)?)?)
}
