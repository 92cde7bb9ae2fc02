//! Configuration subcommands

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use dnsfence_core::config::DnsfenceConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// `dnsfence config`
///
/// 설정은 디스패치 전에 이미 로드/검증되어 있으므로, validate는 그
/// 사실을 보고하고 show는 유효 설정을 직렬화합니다.
pub fn run(
    args: ConfigArgs,
    config_path: &Path,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => writer.render(&ConfigValidateOutput {
            path: config_path.display().to_string(),
            valid: true,
        }),
        ConfigAction::Show { section } => {
            let toml = render_section(config, section.as_deref())?;
            writer.render(&ConfigShowOutput { section, toml })
        }
    }
}

fn render_section(config: &DnsfenceConfig, section: Option<&str>) -> Result<String, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("runtime") => toml::to_string_pretty(&config.runtime),
        Some("addressing") => toml::to_string_pretty(&config.addressing),
        Some("routing") => toml::to_string_pretty(&config.routing),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown config section '{other}' (expected: general, runtime, addressing, routing)"
            )));
        }
    };
    rendered.map_err(|e| CliError::Command(format!("failed to render config: {e}")))
}

// ---- output payloads ----

#[derive(Serialize)]
pub struct ConfigValidateOutput {
    pub path: String,
    pub valid: bool,
}

impl Render for ConfigValidateOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Configuration {} is valid", self.path)
    }
}

#[derive(Serialize)]
pub struct ConfigShowOutput {
    pub section: Option<String>,
    pub toml: String,
}

impl Render for ConfigShowOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        w.write_all(self.toml.as_bytes())
    }
}
