//! 인스턴스 생애주기 관리 — 프로비저닝/디프로비저닝/재시작/상태/조정 전체 흐름
//!
//! [`InstanceManager`]는 할당기, 런타임 드라이버, 저장소를 묶어
//! 테넌트별 필터링 인스턴스의 생애주기를 관장합니다.
//!
//! # 상태 전이
//! ```text
//! absent ──provision──> running ──restart──> running
//!    ▲                     │
//!    └────deprovision──────┘        (실패한 전이는 error로)
//! ```
//!
//! # 동시성
//! - 프로비저닝의 스냅샷 조회 → 주소/포트 선택 → 레코드 기록은 하나의
//!   뮤텍스 구간 안에서 실행됩니다. 할당이 스냅샷 순수 함수이므로 이
//!   직렬화 없이는 동시 프로비저닝이 같은 자원을 고를 수 있습니다.
//! - 조정과 디프로비저닝은 테넌트별 뮤텍스를 공유합니다. 서로 다른
//!   테넌트는 병렬로 진행됩니다.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dnsfence_core::store::{InstanceStore, RuleStore, TenantDirectory};
use dnsfence_core::types::{
    ContainerState, FilterMode, FilterRule, InstanceDescriptor, InstanceRecord, InstanceStatus,
    RuleStatus, TenantId, DNS_PORT,
};

use crate::allocator::ResourcePool;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::reconciler::{RuleReconciler, SyncOutcome};
use crate::routing::{render_routing_config, RoutingDocument};
use crate::runtime::{
    validate_container_name, ContainerRuntime, ContainerSpec, PortPublication, VolumeMount,
};

/// 디프로비저닝 결과
#[derive(Debug, Clone, Serialize)]
pub struct DeprovisionOutcome {
    /// 성공 여부
    pub success: bool,
    /// 결과 메시지
    pub message: String,
    /// 제거된 컨테이너 이름
    pub container_name: String,
}

/// 재시작 결과
#[derive(Debug, Clone, Serialize)]
pub struct RestartOutcome {
    /// 성공 여부
    pub success: bool,
    /// 재시작 후 상태 라벨
    pub status: String,
}

/// 인스턴스 생애주기 관리자
///
/// 런타임 드라이버와 저장소는 주입된 능력 객체이며 프로세스당 한 번
/// 구성되어 참조로 공유됩니다. 드라이버 가용성은 모듈 상태가 아니라
/// 각 호출의 선행 조건으로 확인합니다.
pub struct InstanceManager<R, S>
where
    R: ContainerRuntime,
    S: InstanceStore + TenantDirectory,
{
    /// 런타임 드라이버 (공유)
    runtime: Arc<R>,
    /// 인스턴스/테넌트 저장소 (공유)
    store: Arc<S>,
    /// 엔진 설정
    config: OrchestratorConfig,
    /// 주소/포트 풀
    pool: ResourcePool,
    /// 규칙 조정기
    reconciler: RuleReconciler<R>,
    /// 스냅샷→할당→기록 직렬화 구간
    provision_lock: Mutex<()>,
    /// 테넌트별 상호 배제 (조정 vs 디프로비저닝)
    tenant_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R, S> InstanceManager<R, S>
where
    R: ContainerRuntime,
    S: InstanceStore + TenantDirectory,
{
    /// 테넌트의 필터링 인스턴스를 프로비저닝합니다.
    ///
    /// 주소/포트 할당과 레코드 기록은 하나의 직렬화 구간에서 수행되어
    /// 동시 프로비저닝이 자원을 공유할 수 없습니다. 런타임 호출이
    /// 실패하면 레코드는 기록되지 않으며(부분 상태 없음) 컨테이너
    /// 이름이 테넌트의 순수 함수이므로 재시도는 안전합니다.
    pub async fn provision(
        &self,
        tenant: &TenantId,
        public_ip: IpAddr,
        admin_password: &str,
        mode: FilterMode,
    ) -> Result<InstanceDescriptor, OrchestratorError> {
        let container_name = tenant.container_name();
        validate_container_name(&container_name)?;

        self.runtime.ping().await?;

        let _serial = self.provision_lock.lock().await;

        if !self.store.tenant_exists(tenant).await? {
            return Err(OrchestratorError::TenantNotFound(
                tenant.as_str().to_owned(),
            ));
        }
        if self.store.get_by_tenant(tenant).await?.is_some() {
            return Err(OrchestratorError::AlreadyProvisioned(
                tenant.as_str().to_owned(),
            ));
        }

        let snapshot = self.store.list().await?;
        let used_addresses: HashSet<Ipv4Addr> =
            snapshot.iter().map(|record| record.internal_ip).collect();
        let used_ports: HashSet<u16> = snapshot.iter().map(|record| record.admin_port).collect();
        let internal_ip = self.pool.next_address(&used_addresses)?;
        let admin_port = self.pool.next_admin_port(&used_ports)?;

        info!(
            tenant = %tenant,
            container = container_name.as_str(),
            internal_ip = %internal_ip,
            admin_port,
            "provisioning filtering instance"
        );

        let spec = self.instance_spec(
            tenant,
            &container_name,
            internal_ip,
            admin_port,
            admin_password,
            mode,
        );

        let container_id = match self.runtime.create_container(&spec).await {
            Ok(id) => id,
            Err(e) => return Err(Self::provision_failure(tenant, e)),
        };

        if let Err(e) = self
            .runtime
            .connect_network(&container_name, &self.config.network, internal_ip)
            .await
        {
            // 이름이 비어 있어야 재시도가 성립하므로 만든 컨테이너는 정리
            if let Err(cleanup) = self.runtime.remove_container(&container_name, true).await {
                warn!(
                    container = container_name.as_str(),
                    error = %cleanup,
                    "failed to clean up container after network attach failure"
                );
            }
            return Err(Self::provision_failure(tenant, e));
        }

        let record = InstanceRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant.clone(),
            container_name: container_name.clone(),
            internal_ip,
            public_ip,
            dns_port: DNS_PORT,
            admin_port,
            admin_password: admin_password.to_owned(),
            mode,
            status: InstanceStatus::Running,
            created_at: SystemTime::now(),
        };
        self.store.insert(record.clone()).await?;

        info!(
            tenant = %tenant,
            container = container_name.as_str(),
            "filtering instance provisioned"
        );

        let live = ContainerState {
            id: Some(container_id),
            status: InstanceStatus::Running.as_str().to_owned(),
            health: None,
            running: true,
        };
        Ok(InstanceDescriptor::from_record(&record, &live))
    }

    /// 테넌트의 필터링 인스턴스를 제거합니다.
    ///
    /// 이미 사라진 컨테이너는 성공으로 취급합니다 (멱등). 런타임
    /// 실패 시 레코드를 남겨 재시도가 가능하게 합니다.
    pub async fn deprovision(
        &self,
        tenant: &TenantId,
    ) -> Result<DeprovisionOutcome, OrchestratorError> {
        let lock = self.tenant_lock(tenant).await;
        let _guard = lock.lock().await;

        let record = self
            .store
            .get_by_tenant(tenant)
            .await?
            .ok_or_else(|| OrchestratorError::InstanceNotFound(tenant.as_str().to_owned()))?;

        self.runtime.ping().await?;

        let stop_grace = Duration::from_secs(self.config.stop_grace_secs);
        match self
            .runtime
            .stop_container(&record.container_name, stop_grace)
            .await
        {
            Ok(()) => {}
            Err(OrchestratorError::ContainerNotFound(_)) => {
                debug!(
                    container = record.container_name.as_str(),
                    "container already gone, continuing deprovision"
                );
            }
            Err(e) => {
                return Err(OrchestratorError::DeprovisionFailed {
                    tenant: tenant.as_str().to_owned(),
                    reason: format!("stop: {e}"),
                });
            }
        }

        match self
            .runtime
            .remove_container(&record.container_name, true)
            .await
        {
            Ok(()) | Err(OrchestratorError::ContainerNotFound(_)) => {}
            Err(e) => {
                return Err(OrchestratorError::DeprovisionFailed {
                    tenant: tenant.as_str().to_owned(),
                    reason: format!("remove: {e}"),
                });
            }
        }

        self.store.delete(tenant).await?;

        info!(
            tenant = %tenant,
            container = record.container_name.as_str(),
            "filtering instance deprovisioned"
        );

        Ok(DeprovisionOutcome {
            success: true,
            message: format!("filtering instance for tenant '{tenant}' removed"),
            container_name: record.container_name,
        })
    }

    /// 컨테이너를 유예 시간과 함께 재시작합니다.
    pub async fn restart(&self, container_name: &str) -> Result<RestartOutcome, OrchestratorError> {
        validate_container_name(container_name)?;
        self.runtime.ping().await?;

        let grace = Duration::from_secs(self.config.restart_grace_secs);
        self.runtime.restart_container(container_name, grace).await?;

        let state = self.runtime.inspect_container(container_name).await?;
        info!(container = container_name, status = state.status.as_str(), "container restarted");
        Ok(RestartOutcome {
            success: true,
            status: state.status,
        })
    }

    /// 컨테이너의 라이브 상태를 조회합니다.
    ///
    /// 존재하지 않는 컨테이너는 `not_found` 상태로, 런타임 연결 불가는
    /// `runtime_unavailable` 상태로 보고합니다. 둘 다 에러가 아닌
    /// 정상적인 조회 결과입니다.
    pub async fn status(&self, container_name: &str) -> Result<ContainerState, OrchestratorError> {
        validate_container_name(container_name)?;

        if self.runtime.ping().await.is_err() {
            return Ok(ContainerState::runtime_unavailable());
        }
        match self.runtime.inspect_container(container_name).await {
            Ok(state) => Ok(state),
            Err(OrchestratorError::ContainerNotFound(_)) => Ok(ContainerState::not_found()),
            Err(e) => Err(e),
        }
    }

    /// 모든 인스턴스를 라이브 상태와 함께 나열합니다.
    ///
    /// 자격증명은 결과 타입에 존재하지 않습니다. 목록은 생성 시각
    /// 순으로 정렬됩니다.
    pub async fn list(&self) -> Result<Vec<InstanceDescriptor>, OrchestratorError> {
        let mut records = self.store.list().await?;
        sort_records(&mut records);

        let runtime_up = self.runtime.ping().await.is_ok();
        let mut descriptors = Vec::with_capacity(records.len());
        for record in &records {
            let live = if runtime_up {
                match self.runtime.inspect_container(&record.container_name).await {
                    Ok(state) => state,
                    Err(OrchestratorError::ContainerNotFound(_)) => ContainerState::not_found(),
                    Err(e) => {
                        warn!(
                            container = record.container_name.as_str(),
                            error = %e,
                            "failed to inspect container while listing"
                        );
                        ContainerState {
                            id: None,
                            status: "unknown".to_owned(),
                            health: None,
                            running: false,
                        }
                    }
                }
            } else {
                ContainerState::runtime_unavailable()
            };
            descriptors.push(InstanceDescriptor::from_record(record, &live));
        }
        Ok(descriptors)
    }

    /// 선언 규칙 스냅샷으로 테넌트 인스턴스를 조정합니다.
    ///
    /// 같은 테넌트의 조정/디프로비저닝과 상호 배제되며, 스냅샷에서
    /// 활성이 아니거나 다른 테넌트의 규칙은 방어적으로 걸러냅니다.
    pub async fn reconcile(
        &self,
        tenant: &TenantId,
        declared: &[FilterRule],
    ) -> Result<SyncOutcome, OrchestratorError> {
        let lock = self.tenant_lock(tenant).await;
        let _guard = lock.lock().await;

        let record = self
            .store
            .get_by_tenant(tenant)
            .await?
            .ok_or_else(|| OrchestratorError::InstanceNotFound(tenant.as_str().to_owned()))?;

        let active: Vec<FilterRule> = declared
            .iter()
            .filter(|rule| rule.status == RuleStatus::Active && rule.tenant_id == *tenant)
            .cloned()
            .collect();

        Ok(self.reconciler.sync(&record.container_name, &active).await)
    }

    /// 규칙 저장소에서 선언 스냅샷을 읽어 조정합니다.
    pub async fn reconcile_from<RS: RuleStore>(
        &self,
        tenant: &TenantId,
        rules: &RS,
    ) -> Result<SyncOutcome, OrchestratorError> {
        let declared = rules.active_rules(tenant).await?;
        self.reconcile(tenant, &declared).await
    }

    /// 현재 인스턴스 집합에서 라우팅 설정 문서를 렌더링합니다.
    ///
    /// 저장소 순서와 무관하게 생성 시각 순으로 정렬하여 동일 집합이면
    /// 동일한 바이트가 나오도록 합니다.
    pub async fn render_routing_config(&self) -> Result<RoutingDocument, OrchestratorError> {
        let mut records = self.store.list().await?;
        sort_records(&mut records);
        Ok(render_routing_config(&records, &self.config.routing))
    }

    /// 엔진 설정 참조를 반환합니다.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 테넌트별 뮤텍스를 얻습니다.
    async fn tenant_lock(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock().await;
        Arc::clone(
            locks
                .entry(tenant.as_str().to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// 런타임 실패를 프로비저닝 실패로 변환합니다.
    ///
    /// 드라이버 연결 불가는 사용자 조치가 다른 별도 조건이므로 그대로
    /// 통과시킵니다.
    fn provision_failure(tenant: &TenantId, error: OrchestratorError) -> OrchestratorError {
        match error {
            OrchestratorError::RuntimeUnavailable(_) => error,
            other => OrchestratorError::ProvisionFailed {
                tenant: tenant.as_str().to_owned(),
                reason: other.to_string(),
            },
        }
    }

    /// 필터링 인스턴스의 컨테이너 spec을 구성합니다.
    fn instance_spec(
        &self,
        tenant: &TenantId,
        container_name: &str,
        internal_ip: Ipv4Addr,
        admin_port: u16,
        admin_password: &str,
        mode: FilterMode,
    ) -> ContainerSpec {
        let env = vec![
            ("TZ".to_owned(), self.config.timezone.clone()),
            ("WEBPASSWORD".to_owned(), admin_password.to_owned()),
            ("FTLCONF_LOCAL_IPV4".to_owned(), internal_ip.to_string()),
            (
                "PIHOLE_DNS_".to_owned(),
                self.config.upstream_resolvers.join(";"),
            ),
            ("DNSMASQ_LISTENING".to_owned(), "all".to_owned()),
            ("DNSSEC".to_owned(), "false".to_owned()),
            ("REV_SERVER".to_owned(), "false".to_owned()),
            ("BLOCKING_ENABLED".to_owned(), "true".to_owned()),
            (
                "BLOCKINGMODE".to_owned(),
                mode.blocking_mode_env().to_owned(),
            ),
        ];

        // 설정 상태는 이름 있는 볼륨에 실려 컨테이너 재생성에도 살아남음
        let volumes = vec![
            VolumeMount {
                source: format!("dnsfence_{}_etc", tenant.as_str()),
                target: "/etc/pihole".to_owned(),
            },
            VolumeMount {
                source: format!("dnsfence_{}_dnsmasq", tenant.as_str()),
                target: "/etc/dnsmasq.d".to_owned(),
            },
        ];

        let mut dns = vec!["127.0.0.1".to_owned()];
        if let Some(first_upstream) = self.config.upstream_resolvers.first() {
            dns.push(first_upstream.clone());
        }

        ContainerSpec {
            name: container_name.to_owned(),
            image: self.config.image.clone(),
            env,
            volumes,
            published_ports: vec![PortPublication {
                container_port: 80,
                host_port: admin_port,
            }],
            dns,
            cap_add: vec!["NET_ADMIN".to_owned()],
            restart_unless_stopped: true,
        }
    }
}

/// 생성 시각 → 테넌트 식별자 순의 안정적인 정렬
fn sort_records(records: &mut [InstanceRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.tenant_id.as_str().cmp(b.tenant_id.as_str()))
    });
}

/// 인스턴스 관리자 빌더
pub struct InstanceManagerBuilder<R, S>
where
    R: ContainerRuntime,
    S: InstanceStore + TenantDirectory,
{
    config: OrchestratorConfig,
    runtime: Option<Arc<R>>,
    store: Option<Arc<S>>,
}

impl<R, S> InstanceManagerBuilder<R, S>
where
    R: ContainerRuntime,
    S: InstanceStore + TenantDirectory,
{
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            runtime: None,
            store: None,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// 런타임 드라이버를 설정합니다.
    pub fn runtime(mut self, runtime: Arc<R>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// 저장소를 설정합니다.
    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// 관리자를 빌드합니다.
    pub fn build(self) -> Result<InstanceManager<R, S>, OrchestratorError> {
        self.config.validate()?;

        let runtime = self.runtime.ok_or_else(|| OrchestratorError::Config {
            field: "runtime".to_owned(),
            reason: "container runtime must be provided".to_owned(),
        })?;
        let store = self.store.ok_or_else(|| OrchestratorError::Config {
            field: "store".to_owned(),
            reason: "instance store must be provided".to_owned(),
        })?;

        let pool = ResourcePool::new(&self.config)?;
        let reconciler = RuleReconciler::new(
            Arc::clone(&runtime),
            Duration::from_secs(self.config.exec_timeout_secs),
        );

        Ok(InstanceManager {
            runtime,
            store,
            config: self.config,
            pool,
            reconciler,
            provision_lock: Mutex::new(()),
            tenant_locks: Mutex::new(HashMap::new()),
        })
    }
}

impl<R, S> Default for InstanceManagerBuilder<R, S>
where
    R: ContainerRuntime,
    S: InstanceStore + TenantDirectory,
{
    fn default() -> Self {
        Self::new()
    }
}
