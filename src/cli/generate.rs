use anyhow::Context;
use std::io::Read;
use std::sync::Arc;
use tracing::info;

use crate::cli::GenerateArgs;
use crate::config::Config;
use crate::model::BusinessContext;
use crate::output;
use crate::progress::{BufferSink, EventSink, SseSink};
use crate::provider::{providers_from_config, ModelCliGenerator};
use crate::service::ReportService;

pub async fn execute(args: GenerateArgs) -> anyhow::Result<()> {
    info!("Loading config from {:?}", args.config);
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    apply_overrides(&mut config, &args);
    config.validate()?;

    let request = read_request(&args)?;
    let business_name = request.business_name.clone();

    let generator = Arc::new(ModelCliGenerator::new(&config));
    let providers = providers_from_config(&config);
    let report_dir = config.report_dir.clone();
    let service = ReportService::new(config, generator, providers);

    // Events stream to stdout as SSE frames; the report files are the
    // durable artifact.
    let sink: Arc<dyn EventSink> = if args.quiet {
        Arc::new(BufferSink::new())
    } else {
        Arc::new(SseSink::new(std::io::stdout()))
    };

    let report = service
        .generate(request, sink)
        .await
        .context("report generation failed")?;

    output::write_report_json(&report_dir, &business_name, &report)?;
    if args.markdown {
        output::write_report_markdown(&report_dir, &business_name, &report)?;
    }

    Ok(())
}

/// CLI flags win over the config file where both say something.
fn apply_overrides(config: &mut Config, args: &GenerateArgs) {
    if let Some(report_dir) = &args.report_dir {
        config.report_dir = report_dir.clone();
    }
    if let Some(deadline) = args.enrichment_deadline_ms {
        config.enrichment_deadline_ms = deadline;
    }
}

fn read_request(args: &GenerateArgs) -> anyhow::Result<BusinessContext> {
    let raw = if args.input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read business context from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?
    };

    serde_json::from_str(&raw).context("business context is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> GenerateArgs {
        GenerateArgs {
            config: PathBuf::from("stratgen.yaml"),
            input: PathBuf::from("-"),
            report_dir: None,
            enrichment_deadline_ms: None,
            markdown: false,
            quiet: false,
        }
    }

    #[test]
    fn test_flags_override_config_values() {
        let mut config = Config::default();
        let mut args = args();
        args.report_dir = Some(PathBuf::from("out/reports"));
        args.enrichment_deadline_ms = Some(5_000);

        apply_overrides(&mut config, &args);
        // Overrides only borrow the flags; the request is read from the
        // same args afterwards.
        assert_eq!(args.report_dir, Some(PathBuf::from("out/reports")));
        assert_eq!(config.report_dir, PathBuf::from("out/reports"));
        assert_eq!(config.enrichment_deadline_ms, 5_000);
    }

    #[test]
    fn test_absent_flags_leave_config_untouched() {
        let mut config = Config::default();
        let before = config.enrichment_deadline_ms;
        apply_overrides(&mut config, &args());
        assert_eq!(config.enrichment_deadline_ms, before);
    }
}
