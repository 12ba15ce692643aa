use super::{ReferenceList, Scenario, load_scenario_from_file, load_scenario_from_reader};
use anyhow::Context;
use glob::glob;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// setup/import/teardown 참조를 모두 해석한 실행 계획이다.
///
/// import된 하위 시나리오는 값으로 소유하는 트리 구조이다.
#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    /// 표시 이름.
    pub name: String,
    /// 원본 시나리오 정의.
    pub scenario: Scenario,
    /// 상대 경로 해석 기준 디렉터리.
    pub root: PathBuf,
    /// setup 참조에서 가져와 앞에 실행할 Command 목록.
    pub setup_commands: Vec<Value>,
    /// teardown 참조에서 가져와 뒤에 실행할 Command 목록.
    pub teardown_commands: Vec<Value>,
    /// 자기 Command보다 먼저 실행할 하위 시나리오.
    pub imports: Vec<ScenarioPlan>,
}

impl ScenarioPlan {
    /// setup, 본문, teardown 순으로 Command 전체 개수를 반환한다.
    pub fn command_count(&self) -> usize {
        self.setup_commands.len() + self.scenario.commands.len() + self.teardown_commands.len()
    }
}

/// 시나리오 파일을 읽어 실행 계획을 만든다.
pub fn plan_scenario(path: &Path) -> anyhow::Result<ScenarioPlan> {
    let mut planner = Planner::default();
    planner.plan_file(path)
}

/// 표준 입력 등 Reader에서 읽은 시나리오로 실행 계획을 만든다.
///
/// `root`는 참조 파일을 찾을 기준 디렉터리이다.
pub fn plan_scenario_from_reader<R: Read>(
    reader: &mut R,
    root: &Path,
) -> anyhow::Result<ScenarioPlan> {
    let scenario = load_scenario_from_reader(reader)?;
    let mut planner = Planner::default();
    planner.plan_loaded(scenario, root, "stdin")
}

/// 참조 순환을 감지하면서 계획을 구성한다.
#[derive(Default)]
struct Planner {
    /// 현재 해석 중인 파일 경로 스택.
    chain: Vec<PathBuf>,
}

impl Planner {
    fn plan_file(&mut self, path: &Path) -> anyhow::Result<ScenarioPlan> {
        let canonical = self.enter(path)?;
        let scenario = load_scenario_from_file(&canonical)
            .with_context(|| format!("시나리오 파일 읽기 실패: {}", canonical.display()))?;
        let root = parent_dir(&canonical);
        let fallback = canonical
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| canonical.display().to_string());
        let plan = self.plan_loaded(scenario, &root, &fallback);
        self.chain.pop();
        plan
    }

    fn plan_loaded(
        &mut self,
        scenario: Scenario,
        root: &Path,
        fallback_name: &str,
    ) -> anyhow::Result<ScenarioPlan> {
        let setup_commands = self.composed_commands(&scenario.setup, root)?;
        let teardown_commands = self.composed_commands(&scenario.teardown, root)?;
        let mut imports = Vec::new();
        for path in resolve_references(&scenario.import, root)? {
            debug!(path = %path.display(), "import 시나리오 해석");
            imports.push(self.plan_file(&path)?);
        }
        Ok(ScenarioPlan {
            name: scenario.display_name(fallback_name),
            scenario,
            root: root.to_path_buf(),
            setup_commands,
            teardown_commands,
            imports,
        })
    }

    /// setup/teardown 참조 파일의 Command를 재귀적으로 합성한다.
    fn composed_commands(
        &mut self,
        references: &ReferenceList,
        root: &Path,
    ) -> anyhow::Result<Vec<Value>> {
        let mut commands = Vec::new();
        for path in resolve_references(references, root)? {
            let canonical = self.enter(&path)?;
            let scenario = load_scenario_from_file(&canonical)
                .with_context(|| format!("참조 시나리오 읽기 실패: {}", canonical.display()))?;
            let nested_root = parent_dir(&canonical);
            commands.extend(self.composed_commands(&scenario.setup, &nested_root)?);
            commands.extend(scenario.commands);
            commands.extend(self.composed_commands(&scenario.teardown, &nested_root)?);
            self.chain.pop();
        }
        Ok(commands)
    }

    fn enter(&mut self, path: &Path) -> anyhow::Result<PathBuf> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("{}이(가) 존재하지 않습니다.", path.display()))?;
        if self.chain.contains(&canonical) {
            anyhow::bail!("시나리오 참조가 순환합니다: {}", canonical.display());
        }
        self.chain.push(canonical.clone());
        Ok(canonical)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 참조 문자열을 기준 디렉터리 아래의 파일 경로 목록으로 바꾼다. glob 패턴을 지원한다.
fn resolve_references(references: &ReferenceList, root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for reference in references.iter() {
        let joined = root.join(reference);
        let pattern = joined.to_string_lossy().to_string();
        if !reference.contains(['*', '?', '[']) {
            paths.push(joined);
            continue;
        }
        let mut matched: Vec<PathBuf> = Vec::new();
        for entry in glob(&pattern).context("glob 패턴 파싱 실패")? {
            matched.push(entry?);
        }
        if matched.is_empty() {
            anyhow::bail!("참조 패턴에 해당하는 파일이 없습니다: {pattern}");
        }
        matched.sort();
        paths.extend(matched);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("디렉터리 생성 실패");
        }
        fs::write(&path, content).expect("파일 작성 실패");
        path
    }

    #[test]
    fn setup_and_teardown_commands_are_composed_around_own_commands() {
        let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
        write(dir.path(), "common/login.yaml", "commands: [auth.login]\n");
        write(dir.path(), "common/logout.yaml", "commands: [auth.logout]\n");
        let main = write(
            dir.path(),
            "main.yaml",
            "name: main\nsetup: common/login.yaml\nteardown: common/logout.yaml\ncommands: [files.list]\n",
        );

        let plan = plan_scenario(&main).expect("계획 생성 실패");
        assert_eq!(plan.name, "main");
        assert_eq!(plan.setup_commands, vec![json!("auth.login")]);
        assert_eq!(plan.scenario.commands, vec![json!("files.list")]);
        assert_eq!(plan.teardown_commands, vec![json!("auth.logout")]);
        assert_eq!(plan.command_count(), 3);
    }

    #[test]
    fn imports_become_child_plans_in_glob_order() {
        let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
        write(dir.path(), "parts/b.yaml", "commands: [b.run]\n");
        write(dir.path(), "parts/a.yaml", "exit_on_error: true\ncommands: [a.run]\n");
        let main = write(dir.path(), "main.yaml", "import: parts/*.yaml\ncommands: []\n");

        let plan = plan_scenario(&main).expect("계획 생성 실패");
        let names: Vec<&str> = plan.imports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(plan.imports[0].scenario.exit_on_error, Some(true));
        assert!(plan.imports[0].root.ends_with("parts"));
    }

    #[test]
    fn cyclic_imports_are_rejected() {
        let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
        write(dir.path(), "a.yaml", "import: b.yaml\ncommands: []\n");
        let b = write(dir.path(), "b.yaml", "import: a.yaml\ncommands: []\n");
        let err = plan_scenario(&b).expect_err("순환 참조");
        assert!(format!("{err:#}").contains("순환"));
    }

    #[test]
    fn missing_reference_is_reported() {
        let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
        let main = write(dir.path(), "main.yaml", "setup: nope.yaml\ncommands: []\n");
        assert!(plan_scenario(&main).is_err());
    }
}
