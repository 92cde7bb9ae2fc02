//! Instance lifecycle subcommands: provision, deprovision, restart, status, list

use std::io::Write;

use serde::Serialize;

use dnsfence_core::config::DnsfenceConfig;
use dnsfence_core::types::{ContainerState, FilterMode, InstanceDescriptor, TenantId};
use dnsfence_orchestrator::{DeprovisionOutcome, RestartOutcome};

use crate::cli::{DeprovisionArgs, ModeArg, ProvisionArgs, RestartArgs, StatusArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

impl From<ModeArg> for FilterMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Nxdomain => FilterMode::NxDomain,
            ModeArg::NullIp => FilterMode::NullIp,
        }
    }
}

/// `dnsfence provision`
pub async fn provision(
    args: ProvisionArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (manager, _store) = super::build_manager(config).await?;
    let tenant = TenantId::new(args.tenant);

    let instance = manager
        .provision(&tenant, args.public_ip, &args.password, args.mode.into())
        .await?;

    writer.render(&ProvisionOutput { instance })
}

/// `dnsfence deprovision`
pub async fn deprovision(
    args: DeprovisionArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (manager, _store) = super::build_manager(config).await?;
    let outcome = manager.deprovision(&TenantId::new(args.tenant)).await?;
    writer.render(&DeprovisionOutput { outcome })
}

/// `dnsfence restart`
pub async fn restart(
    args: RestartArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (manager, _store) = super::build_manager(config).await?;
    let outcome = manager.restart(&args.container).await?;
    writer.render(&RestartOutput {
        container: args.container,
        outcome,
    })
}

/// `dnsfence status`
pub async fn status(
    args: StatusArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (manager, _store) = super::build_manager(config).await?;
    let state = manager.status(&args.container).await?;
    writer.render(&StatusOutput {
        container: args.container,
        state,
    })
}

/// `dnsfence list`
pub async fn list(config: &DnsfenceConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let (manager, _store) = super::build_manager(config).await?;
    let instances = manager.list().await?;
    writer.render(&ListOutput { instances })
}

// ---- output payloads ----

#[derive(Serialize)]
pub struct ProvisionOutput {
    pub instance: InstanceDescriptor,
}

impl Render for ProvisionOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let instance = &self.instance;
        writeln!(w, "Provisioned filtering instance")?;
        writeln!(w, "  Tenant:      {}", instance.tenant_id)?;
        writeln!(w, "  Container:   {}", instance.container_name)?;
        writeln!(w, "  Internal IP: {}", instance.internal_ip)?;
        writeln!(w, "  Public IP:   {}", instance.public_ip)?;
        writeln!(w, "  DNS port:    {}", instance.dns_port)?;
        writeln!(w, "  Admin URL:   {}", instance.admin_url)?;
        writeln!(w, "  Mode:        {}", instance.mode)?;
        writeln!(w, "  Status:      {}", instance.status)?;
        Ok(())
    }
}

#[derive(Serialize)]
pub struct DeprovisionOutput {
    #[serde(flatten)]
    pub outcome: DeprovisionOutcome,
}

impl Render for DeprovisionOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.outcome.message)
    }
}

#[derive(Serialize)]
pub struct RestartOutput {
    pub container: String,
    #[serde(flatten)]
    pub outcome: RestartOutcome,
}

impl Render for RestartOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Container {} restarted (status: {})",
            self.container, self.outcome.status
        )
    }
}

#[derive(Serialize)]
pub struct StatusOutput {
    pub container: String,
    #[serde(flatten)]
    pub state: ContainerState,
}

impl Render for StatusOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Container: {}", self.container)?;
        writeln!(w, "  Status:  {}", self.state.status)?;
        writeln!(w, "  Running: {}", self.state.running)?;
        if let Some(health) = &self.state.health {
            writeln!(w, "  Health:  {health}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct ListOutput {
    pub instances: Vec<InstanceDescriptor>,
}

impl Render for ListOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{:<12} {:<28} {:<15} {:<15} {:<8} {:<20}",
            "Tenant", "Container", "Internal IP", "Public IP", "Port", "Status"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;
        for instance in &self.instances {
            writeln!(
                w,
                "{:<12} {:<28} {:<15} {:<15} {:<8} {:<20}",
                instance.tenant_id.as_str(),
                instance.container_name,
                instance.internal_ip.to_string(),
                instance.public_ip.to_string(),
                instance.admin_port,
                instance.status,
            )?;
        }
        writeln!(w, "{} instance(s)", self.instances.len())?;
        Ok(())
    }
}
