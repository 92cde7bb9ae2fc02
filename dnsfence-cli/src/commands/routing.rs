//! Routing configuration subcommand

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use dnsfence_core::config::DnsfenceConfig;
use dnsfence_orchestrator::RoutingDocument;

use crate::cli::{RoutingAction, RoutingArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// `dnsfence routing`
pub async fn run(
    args: RoutingArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RoutingAction::Render { out } => render(out, config, writer).await,
    }
}

async fn render(
    out: Option<PathBuf>,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (manager, _store) = super::build_manager(config).await?;
    let document = manager.render_routing_config().await?;

    let written_to = match out {
        Some(path) => {
            tokio::fs::write(&path, &document.text).await?;
            Some(path.display().to_string())
        }
        None => None,
    };

    writer.render(&RoutingOutput {
        document,
        written_to,
    })
}

// ---- output payload ----

#[derive(Serialize)]
pub struct RoutingOutput {
    #[serde(flatten)]
    pub document: RoutingDocument,
    pub written_to: Option<String>,
}

impl Render for RoutingOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        match &self.written_to {
            Some(path) => {
                writeln!(
                    w,
                    "Routing config written to {path} ({} instance(s), {} pool(s))",
                    self.document.instance_count,
                    self.document.pools.len(),
                )
            }
            // 파일 출력이 아니면 문서 자체가 출력물
            None => w.write_all(self.document.text.as_bytes()),
        }
    }
}
