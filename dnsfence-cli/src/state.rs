//! JSON file-backed store
//!
//! 외부 CRUD 레이어를 대신하는 단일 파일 영속성 어댑터입니다. 상태는
//! `{data_dir}/state.json` 하나에 담기며, 모든 변경은 쓰기 잠금 아래에서
//! 즉시 디스크에 반영됩니다. 인스턴스 레코드가 곧 할당 상태의 단일
//! 진실 공급원이므로 별도의 할당 장부는 없습니다.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use dnsfence_core::error::{DnsfenceError, StoreError};
use dnsfence_core::store::{InstanceStore, RuleStore, TenantDirectory};
use dnsfence_core::types::{FilterRule, InstanceRecord, RuleStatus, TenantId};

/// 상태 파일의 직렬화 형태
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    /// 등록된 테넌트
    #[serde(default)]
    tenants: BTreeSet<String>,
    /// 테넌트별 인스턴스 레코드
    #[serde(default)]
    instances: BTreeMap<String, InstanceRecord>,
    /// 테넌트별 선언 규칙
    #[serde(default)]
    rules: BTreeMap<String, Vec<FilterRule>>,
}

/// JSON 파일 저장소
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<StateFile>,
}

impl JsonFileStore {
    /// 상태 파일을 열거나, 없으면 빈 상태로 시작합니다.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DnsfenceError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                DnsfenceError::Store(StoreError::Serialization(format!(
                    "{}: {e}",
                    path.display()
                )))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateFile::default(),
            Err(e) => return Err(DnsfenceError::Io(e)),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// 현재 상태를 디스크에 기록합니다 (쓰기 잠금 하에서 호출).
    async fn persist(&self, state: &StateFile) -> Result<(), DnsfenceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| DnsfenceError::Store(StoreError::Serialization(e.to_string())))?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// 테넌트를 등록합니다.
    pub async fn register_tenant(&self, tenant: &TenantId) -> Result<bool, DnsfenceError> {
        let mut state = self.state.write().await;
        let inserted = state.tenants.insert(tenant.as_str().to_owned());
        if inserted {
            self.persist(&state).await?;
        }
        Ok(inserted)
    }

    /// 등록된 테넌트 목록을 반환합니다.
    pub async fn tenants(&self) -> Vec<String> {
        self.state.read().await.tenants.iter().cloned().collect()
    }

    /// 테넌트의 선언 규칙을 교체합니다.
    pub async fn set_rules(
        &self,
        tenant: &TenantId,
        rules: Vec<FilterRule>,
    ) -> Result<(), DnsfenceError> {
        let mut state = self.state.write().await;
        state.rules.insert(tenant.as_str().to_owned(), rules);
        self.persist(&state).await
    }
}

impl InstanceStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<InstanceRecord>, DnsfenceError> {
        Ok(self.state.read().await.instances.values().cloned().collect())
    }

    async fn get_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<InstanceRecord>, DnsfenceError> {
        Ok(self
            .state
            .read()
            .await
            .instances
            .get(tenant.as_str())
            .cloned())
    }

    async fn insert(&self, record: InstanceRecord) -> Result<(), DnsfenceError> {
        let mut state = self.state.write().await;
        state
            .instances
            .insert(record.tenant_id.as_str().to_owned(), record);
        self.persist(&state).await
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), DnsfenceError> {
        let mut state = self.state.write().await;
        state.instances.remove(tenant.as_str());
        self.persist(&state).await
    }
}

impl TenantDirectory for JsonFileStore {
    async fn tenant_exists(&self, tenant: &TenantId) -> Result<bool, DnsfenceError> {
        Ok(self.state.read().await.tenants.contains(tenant.as_str()))
    }
}

impl RuleStore for JsonFileStore {
    async fn active_rules(&self, tenant: &TenantId) -> Result<Vec<FilterRule>, DnsfenceError> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .get(tenant.as_str())
            .map(|list| {
                list.iter()
                    .filter(|rule| rule.status == RuleStatus::Active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
