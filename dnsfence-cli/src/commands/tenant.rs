//! Tenant directory subcommands

use std::io::Write;

use serde::Serialize;

use dnsfence_core::config::DnsfenceConfig;
use dnsfence_core::types::TenantId;

use crate::cli::{TenantAction, TenantArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// `dnsfence tenant`
pub async fn run(
    args: TenantArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    // 테넌트 디렉토리 조작은 런타임 드라이버가 필요 없음
    let store = super::open_store(config).await?;

    match args.action {
        TenantAction::Add { tenant } => {
            let tenant = TenantId::new(tenant);
            let registered = store.register_tenant(&tenant).await?;
            writer.render(&TenantAddOutput {
                tenant: tenant.as_str().to_owned(),
                registered,
            })
        }
        TenantAction::List => {
            let tenants = store.tenants().await;
            writer.render(&TenantListOutput { tenants })
        }
    }
}

// ---- output payloads ----

#[derive(Serialize)]
pub struct TenantAddOutput {
    pub tenant: String,
    pub registered: bool,
}

impl Render for TenantAddOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.registered {
            writeln!(w, "Tenant '{}' registered", self.tenant)
        } else {
            writeln!(w, "Tenant '{}' was already registered", self.tenant)
        }
    }
}

#[derive(Serialize)]
pub struct TenantListOutput {
    pub tenants: Vec<String>,
}

impl Render for TenantListOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for tenant in &self.tenants {
            writeln!(w, "{tenant}")?;
        }
        writeln!(w, "{} tenant(s)", self.tenants.len())?;
        Ok(())
    }
}
