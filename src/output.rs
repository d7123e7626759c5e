//! Report persistence: one dated directory per day, one JSON artifact and
//! one human-readable markdown rendering per run.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::OutputError;
use crate::model::{HookProvenance, StrategyReport};

fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}

fn dated_dir(report_dir: &Path) -> PathBuf {
    report_dir.join(Local::now().format("%Y-%m-%d").to_string())
}

/// Write the raw report JSON. Returns the path written.
pub fn write_report_json(
    report_dir: &Path,
    business_name: &str,
    report: &StrategyReport,
) -> Result<PathBuf, OutputError> {
    let dir = dated_dir(report_dir);
    fs::create_dir_all(&dir).map_err(OutputError::CreateDir)?;

    let stamp = Local::now().format("%H%M%S");
    let path = dir.join(format!("{}-{}.json", slugify(business_name), stamp));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).map_err(OutputError::WriteReport)?;

    info!("Wrote report to {}", path.display());
    Ok(path)
}

/// Write a markdown rendering alongside the JSON artifact.
pub fn write_report_markdown(
    report_dir: &Path,
    business_name: &str,
    report: &StrategyReport,
) -> Result<PathBuf, OutputError> {
    let dir = dated_dir(report_dir);
    fs::create_dir_all(&dir).map_err(OutputError::CreateDir)?;

    let stamp = Local::now().format("%H%M%S");
    let path = dir.join(format!("{}-{}.md", slugify(business_name), stamp));

    let mut content = String::new();
    content.push_str(&format!("# Strategy Report: {}\n\n", business_name.trim()));

    content.push_str("## Industry & Market\n\n");
    content.push_str(&format!("{}\n\n", report.industry_overview));

    content.push_str("## ICP Analysis\n\n");
    content.push_str(&format!("{}\n\n", report.icp_analysis));

    content.push_str("## Offer Analysis\n\n");
    content.push_str(&format!("{}\n\n", report.offer_analysis));

    content.push_str("## Competitor Analysis\n\n");
    content.push_str(&format!("{}\n\n", report.competitor_analysis));

    if !report.competitors.is_empty() {
        content.push_str("| Competitor | Tier | Ads Collected |\n");
        content.push_str("|------------|------|---------------|\n");
        for competitor in &report.competitors {
            content.push_str(&format!(
                "| {} | {:?} | {} |\n",
                competitor.name,
                competitor.tier,
                competitor.ads.len()
            ));
        }
        content.push('\n');
    }

    content.push_str("## Cross-Analysis\n\n");
    content.push_str(&format!("{}\n\n", report.cross_analysis));

    if let Some(keywords) = &report.keyword_intelligence {
        content.push_str("## Keyword Intelligence\n\n");
        for entry in &keywords.keywords {
            match entry.volume {
                Some(volume) => {
                    content.push_str(&format!("- `{}` (volume {})\n", entry.term, volume))
                }
                None => content.push_str(&format!("- `{}`\n", entry.term)),
            }
        }
        content.push('\n');
    }

    if let Some(seo) = &report.seo_audit {
        content.push_str("## SEO Audit\n\n");
        content.push_str(&format!("{}\n\n", seo.summary));
        for issue in &seo.issues {
            content.push_str(&format!("- {}\n", issue));
        }
        content.push('\n');
    }

    if !report.hooks.is_empty() {
        content.push_str("## Marketing Hooks\n\n");
        for hook in &report.hooks {
            let tag = match hook.provenance {
                HookProvenance::Extracted => "extracted",
                HookProvenance::Inspired => "inspired",
                HookProvenance::Generated => "generated",
            };
            content.push_str(&format!("- {} *({})*\n", hook.text, tag));
        }
        content.push('\n');
    }

    fs::write(&path, content).map_err(OutputError::WriteReport)?;

    info!("Wrote markdown report to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn report() -> StrategyReport {
        StrategyReport {
            industry_overview: "overview".into(),
            icp_analysis: "icp".into(),
            offer_analysis: "offer".into(),
            competitor_analysis: "deep".into(),
            cross_analysis: "cross".into(),
            competitors: vec![CompetitorRecord {
                id: "rival".into(),
                name: "Rival".into(),
                tier: Tier::Full,
                reviews: None,
                pricing: None,
                ads: vec![],
            }],
            keyword_intelligence: None,
            seo_audit: None,
            hooks: vec![HookCandidate::generated("Try it today")],
            enrichments: EnrichmentAvailability::default(),
        }
    }

    #[test]
    fn test_json_report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report_json(dir.path(), "Acme Co.", &report()).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("acme-co"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: StrategyReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.industry_overview, "overview");
        assert_eq!(parsed.hooks.len(), 1);
    }

    #[test]
    fn test_markdown_report_contains_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report_markdown(dir.path(), "Acme", &report()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## Industry & Market"));
        assert!(content.contains("## Marketing Hooks"));
        assert!(content.contains("| Rival | Full | 0 |"));
    }

    #[test]
    fn test_slug_falls_back_on_symbols_only() {
        assert_eq!(slugify("!!!"), "report");
        assert_eq!(slugify("  Acme  Co "), "acme--co");
    }
}
