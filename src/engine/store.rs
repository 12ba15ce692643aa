use serde_json::{Map, Value};

/// 실행 중 Command 간 결과를 공유하기 위한 저장소이다.
///
/// 삽입 순서를 유지하며, 표현식 질의가 바로 수행될 수 있도록 JSON 객체 형태로 보관한다.
#[derive(Debug, Clone)]
pub struct ResultStore {
    /// 이름별 저장 결과. 항상 `Value::Object`이다.
    root: Value,
}

impl ResultStore {
    /// 비어 있는 저장소를 생성한다.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// 결과를 이름으로 저장한다. 같은 이름이 있으면 덮어쓴다.
    ///
    /// # 매개변수
    /// - `name`: 저장할 바인딩 이름.
    /// - `value`: 저장할 결과 값.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.root {
            map.insert(name.into(), value);
        }
    }

    /// 저장된 결과를 조회한다.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    /// 이름이 저장되어 있는지 확인한다.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 저장된 결과 수를 반환한다.
    pub fn len(&self) -> usize {
        self.root.as_object().map_or(0, Map::len)
    }

    /// 저장소가 비었는지 여부를 반환한다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 표현식 질의 대상이 되는 전체 객체를 반환한다.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// 저장 순서대로 바인딩 이름을 순회한다.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.root.as_object().into_iter().flat_map(Map::keys)
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insertion_order_is_preserved_and_overwrite_keeps_position() {
        let mut store = ResultStore::new();
        store.insert("second", json!(2));
        store.insert("first", json!(1));
        store.insert("second", json!(22));
        let names: Vec<&String> = store.names().collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(store.get("second"), Some(&json!(22)));
        assert_eq!(store.len(), 2);
        assert!(store.contains("first"));
        assert!(!store.contains("third"));
    }
}
