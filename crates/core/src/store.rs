//! 영속성 trait — 외부 CRUD 레이어와의 경계 정의
//!
//! 인스턴스 레코드와 선언 규칙의 실제 저장소는 외부 협력자입니다.
//! 오케스트레이터는 이 trait들을 통해서만 저장소에 접근하므로
//! 백엔드 교체와 테스트 주입이 자유롭습니다.
//!
//! 살아있는 인스턴스 컬렉션은 주소/포트 할당 상태의 단일 진실
//! 공급원입니다. 할당기는 자체 카운터를 갖지 않고 매 결정마다
//! [`InstanceStore::list`] 스냅샷에서 점유 상태를 재계산합니다.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use crate::error::DnsfenceError;
use crate::types::{FilterRule, InstanceRecord, RuleStatus, TenantId};

/// 인스턴스 레코드 저장소 trait
///
/// 모든 메서드는 `Send` future를 반환하여 async 컨텍스트 간 안전한
/// 공유를 보장합니다.
pub trait InstanceStore: Send + Sync + 'static {
    /// 살아있는 모든 인스턴스 레코드를 반환합니다.
    fn list(&self) -> impl Future<Output = Result<Vec<InstanceRecord>, DnsfenceError>> + Send;

    /// 테넌트의 인스턴스 레코드를 조회합니다.
    fn get_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = Result<Option<InstanceRecord>, DnsfenceError>> + Send;

    /// 새 인스턴스 레코드를 기록합니다.
    fn insert(
        &self,
        record: InstanceRecord,
    ) -> impl Future<Output = Result<(), DnsfenceError>> + Send;

    /// 테넌트의 인스턴스 레코드를 삭제합니다.
    fn delete(&self, tenant: &TenantId)
    -> impl Future<Output = Result<(), DnsfenceError>> + Send;
}

/// 테넌트 디렉토리 trait
///
/// 테넌트 레코드 자체는 CRUD 레이어 소유입니다. 엔진은 프로비저닝
/// 전에 존재 여부만 확인합니다.
pub trait TenantDirectory: Send + Sync + 'static {
    /// 테넌트 존재 여부를 반환합니다.
    fn tenant_exists(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = Result<bool, DnsfenceError>> + Send;
}

/// 선언 규칙 스냅샷 저장소 trait
pub trait RuleStore: Send + Sync + 'static {
    /// 테넌트의 활성 규칙 스냅샷을 반환합니다.
    ///
    /// 반환된 목록은 한 번의 조정 패스 동안 불변 입력으로 취급됩니다.
    fn active_rules(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = Result<Vec<FilterRule>, DnsfenceError>> + Send;
}

/// 인메모리 저장소
///
/// 테스트와 단일 프로세스 데모에서 외부 CRUD 레이어를 대신합니다.
#[derive(Default)]
pub struct MemoryStore {
    tenants: RwLock<std::collections::HashSet<String>>,
    instances: RwLock<HashMap<String, InstanceRecord>>,
    rules: RwLock<HashMap<String, Vec<FilterRule>>>,
}

impl MemoryStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 테넌트를 등록합니다.
    pub async fn register_tenant(&self, tenant: &TenantId) {
        self.tenants
            .write()
            .await
            .insert(tenant.as_str().to_owned());
    }

    /// 테넌트의 규칙 목록을 교체합니다.
    pub async fn set_rules(&self, tenant: &TenantId, rules: Vec<FilterRule>) {
        self.rules
            .write()
            .await
            .insert(tenant.as_str().to_owned(), rules);
    }

    /// 저장된 인스턴스 수를 반환합니다.
    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }
}

impl InstanceStore for MemoryStore {
    async fn list(&self) -> Result<Vec<InstanceRecord>, DnsfenceError> {
        Ok(self.instances.read().await.values().cloned().collect())
    }

    async fn get_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<InstanceRecord>, DnsfenceError> {
        Ok(self.instances.read().await.get(tenant.as_str()).cloned())
    }

    async fn insert(&self, record: InstanceRecord) -> Result<(), DnsfenceError> {
        self.instances
            .write()
            .await
            .insert(record.tenant_id.as_str().to_owned(), record);
        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), DnsfenceError> {
        self.instances.write().await.remove(tenant.as_str());
        Ok(())
    }
}

impl TenantDirectory for MemoryStore {
    async fn tenant_exists(&self, tenant: &TenantId) -> Result<bool, DnsfenceError> {
        Ok(self.tenants.read().await.contains(tenant.as_str()))
    }
}

impl RuleStore for MemoryStore {
    async fn active_rules(&self, tenant: &TenantId) -> Result<Vec<FilterRule>, DnsfenceError> {
        let rules = self.rules.read().await;
        Ok(rules
            .get(tenant.as_str())
            .map(|list| {
                list.iter()
                    .filter(|r| r.status == RuleStatus::Active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
