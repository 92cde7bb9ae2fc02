//! 라우팅 설정 생성 — 실행 중 인스턴스 집합의 결정적 렌더링
//!
//! 실행 중인 각 인스턴스에 대해 백엔드 풀 선언과 출발지 주소 매칭
//! 규칙을 하나씩 내보내고, 마지막에 폴백 풀과 catch-all 규칙을
//! 내보냅니다. 매칭은 first-match-wins이므로 테넌트별 규칙이 모두
//! catch-all보다 앞에 와야 하며, catch-all 덕분에 모든 출발지 주소가
//! 정확히 하나의 규칙에 매칭됩니다.
//!
//! 동일한 입력 목록에 대해 출력은 바이트 단위로 재현 가능합니다
//! (멱등 재배포와 테스트의 전제). 풀/규칙 순서는 입력 순서를 따릅니다.

use std::net::IpAddr;

use serde::Serialize;

use dnsfence_core::config::RoutingConfig;
use dnsfence_core::types::{InstanceRecord, InstanceStatus};

/// 렌더링된 라우팅 설정 문서
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDocument {
    /// 전체 설정 텍스트 (라우팅 레이어와의 외부 계약)
    pub text: String,
    /// 내보낸 테넌트 풀 이름 (입력 순서)
    pub pools: Vec<String>,
    /// 포함된 인스턴스 수
    pub instance_count: usize,
}

/// 출발지 매칭용 단일 호스트 넷마스크를 반환합니다.
fn host_netmask(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => format!("{v4}/32"),
        IpAddr::V6(v6) => format!("{v6}/128"),
    }
}

/// 인스턴스 목록에서 라우팅 설정 문서를 렌더링합니다.
///
/// `Running` 상태가 아닌 레코드는 제외됩니다. 입력 순서가 곧 풀/규칙
/// 순서이므로 호출자는 결정적 순서(예: 생성 시각 순)의 목록을 전달해야
/// 합니다.
pub fn render_routing_config(
    instances: &[InstanceRecord],
    config: &RoutingConfig,
) -> RoutingDocument {
    let running: Vec<&InstanceRecord> = instances
        .iter()
        .filter(|record| record.status == InstanceStatus::Running)
        .collect();

    let pools: Vec<String> = running
        .iter()
        .map(|record| record.tenant_id.pool_name())
        .collect();

    let mut lines: Vec<String> = vec![
        "-- dnsdist configuration for multi-tenant DNS routing".to_owned(),
        "-- Auto-generated by dnsfence".to_owned(),
        String::new(),
        "-- Listen address".to_owned(),
        format!("setLocal(\"{}\")", config.listen),
        String::new(),
        "-- Logging".to_owned(),
        "setVerbose(true)".to_owned(),
        String::new(),
        "-- Backend filtering instances".to_owned(),
    ];

    for (record, pool) in running.iter().zip(&pools) {
        lines.push(format!(
            "newServer({{address=\"{}:{}\", name=\"{}\", pool=\"{}\"}})",
            record.internal_ip, record.dns_port, record.container_name, pool,
        ));
    }

    lines.extend([
        String::new(),
        "-- Default fallback resolver".to_owned(),
        format!(
            "newServer({{address=\"{}\", name=\"fallback-dns\", pool=\"default\"}})",
            config.fallback_resolver,
        ),
        String::new(),
        "-- Routing rules based on source address".to_owned(),
    ]);

    for (record, pool) in running.iter().zip(&pools) {
        lines.push(format!(
            "addAction(NetmaskGroupRule(newNMG({{\"{}\"}})), PoolAction(\"{}\"))",
            host_netmask(record.public_ip),
            pool,
        ));
    }

    lines.extend([
        String::new(),
        "-- All other sources use the default pool".to_owned(),
        "addAction(AllRule(), PoolAction(\"default\"))".to_owned(),
        String::new(),
        "-- Statistics and web interface".to_owned(),
        format!("webserver(\"{}\")", config.webserver_listen),
        String::new(),
        "-- Health checks".to_owned(),
        "setServerPolicy(firstAvailable)".to_owned(),
        String::new(),
        "-- Per-tenant packet caches".to_owned(),
    ]);

    for pool in &pools {
        lines.push(format!(
            "getPool(\"{pool}\"):setCache(newPacketCache({}, {{maxTTL={}, minTTL=0}}))",
            config.cache_max_entries, config.cache_max_ttl_secs,
        ));
    }

    let mut text = lines.join("\n");
    text.push('\n');

    RoutingDocument {
        text,
        instance_count: running.len(),
        pools,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsfence_core::types::{FilterMode, TenantId, DNS_PORT};
    use std::net::Ipv4Addr;
    use std::time::SystemTime;
    use uuid::Uuid;

    fn record(tenant: &str, last_octet: u8, public_ip: &str) -> InstanceRecord {
        let tenant_id = TenantId::new(tenant);
        InstanceRecord {
            id: Uuid::new_v4(),
            container_name: tenant_id.container_name(),
            tenant_id,
            internal_ip: Ipv4Addr::new(172, 20, 0, last_octet),
            public_ip: public_ip.parse().unwrap(),
            dns_port: DNS_PORT,
            admin_port: 8100,
            admin_password: "secret".to_owned(),
            mode: FilterMode::NxDomain,
            status: InstanceStatus::Running,
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn rendering_is_byte_for_byte_reproducible() {
        let instances = vec![
            record("acme", 10, "203.0.113.7"),
            record("globex", 11, "203.0.113.8"),
        ];
        let config = RoutingConfig::default();

        let first = render_routing_config(&instances, &config);
        let second = render_routing_config(&instances, &config);
        assert_eq!(first.text, second.text);
        assert_eq!(first.pools, second.pools);
    }

    #[test]
    fn empty_instance_list_renders_default_pool_and_catch_all_only() {
        let document = render_routing_config(&[], &RoutingConfig::default());

        assert_eq!(document.instance_count, 0);
        assert!(document.pools.is_empty());
        assert_eq!(
            document.text,
            "-- dnsdist configuration for multi-tenant DNS routing\n\
             -- Auto-generated by dnsfence\n\
             \n\
             -- Listen address\n\
             setLocal(\"0.0.0.0:5353\")\n\
             \n\
             -- Logging\n\
             setVerbose(true)\n\
             \n\
             -- Backend filtering instances\n\
             \n\
             -- Default fallback resolver\n\
             newServer({address=\"8.8.8.8:53\", name=\"fallback-dns\", pool=\"default\"})\n\
             \n\
             -- Routing rules based on source address\n\
             \n\
             -- All other sources use the default pool\n\
             addAction(AllRule(), PoolAction(\"default\"))\n\
             \n\
             -- Statistics and web interface\n\
             webserver(\"0.0.0.0:8053\")\n\
             \n\
             -- Health checks\n\
             setServerPolicy(firstAvailable)\n\
             \n\
             -- Per-tenant packet caches\n"
        );
    }

    #[test]
    fn per_tenant_rules_precede_catch_all() {
        let instances = vec![
            record("acme", 10, "203.0.113.7"),
            record("globex", 11, "203.0.113.8"),
        ];
        let document = render_routing_config(&instances, &RoutingConfig::default());

        let catch_all = document
            .text
            .find("addAction(AllRule(), PoolAction(\"default\"))")
            .unwrap();
        for pool in &document.pools {
            let rule = document
                .text
                .find(&format!("PoolAction(\"{pool}\"))"))
                .unwrap();
            assert!(rule < catch_all, "rule for {pool} must precede catch-all");
        }
    }

    #[test]
    fn backend_binds_internal_address_and_dns_port() {
        let instances = vec![record("acme", 10, "203.0.113.7")];
        let document = render_routing_config(&instances, &RoutingConfig::default());

        assert!(document.text.contains(
            "newServer({address=\"172.20.0.10:53\", name=\"dnsfence-tenant-acme\", pool=\"tenant_acme\"})"
        ));
    }

    #[test]
    fn source_rule_uses_host_netmask() {
        let instances = vec![record("acme", 10, "203.0.113.7")];
        let document = render_routing_config(&instances, &RoutingConfig::default());

        assert!(document.text.contains(
            "addAction(NetmaskGroupRule(newNMG({\"203.0.113.7/32\"})), PoolAction(\"tenant_acme\"))"
        ));
    }

    #[test]
    fn ipv6_public_address_uses_128_netmask() {
        let instances = vec![record("acme", 10, "2001:db8::7")];
        let document = render_routing_config(&instances, &RoutingConfig::default());
        assert!(document.text.contains("2001:db8::7/128"));
    }

    #[test]
    fn non_running_instances_are_excluded() {
        let mut stopped = record("dead", 12, "203.0.113.9");
        stopped.status = InstanceStatus::Error;
        let instances = vec![record("acme", 10, "203.0.113.7"), stopped];

        let document = render_routing_config(&instances, &RoutingConfig::default());
        assert_eq!(document.instance_count, 1);
        assert_eq!(document.pools, ["tenant_acme"]);
        assert!(!document.text.contains("tenant_dead"));
    }

    #[test]
    fn each_pool_gets_its_own_cache() {
        let instances = vec![
            record("acme", 10, "203.0.113.7"),
            record("globex", 11, "203.0.113.8"),
        ];
        let document = render_routing_config(&instances, &RoutingConfig::default());

        assert!(document.text.contains(
            "getPool(\"tenant_acme\"):setCache(newPacketCache(10000, {maxTTL=86400, minTTL=0}))"
        ));
        assert!(document.text.contains(
            "getPool(\"tenant_globex\"):setCache(newPacketCache(10000, {maxTTL=86400, minTTL=0}))"
        ));
    }

    #[test]
    fn pool_order_follows_input_order() {
        let instances = vec![
            record("zeta", 10, "203.0.113.7"),
            record("alpha", 11, "203.0.113.8"),
        ];
        let document = render_routing_config(&instances, &RoutingConfig::default());
        assert_eq!(document.pools, ["tenant_zeta", "tenant_alpha"]);
    }
}
