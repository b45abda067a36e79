//! Rendering of analysis profiles for people and tools.
//!
//! Three formatters share one [`ProfileFormatter`] trait: JSON for programmatic
//! consumption, a console-oriented human format, and Markdown for reports.
//!
//! # Examples
//!
//! ```rust,no_run
//! use field_guard::formatters::{FormatterConfig, HumanFormatter, ProfileFormatter};
//! # fn example(profile: &field_guard::analyzers::AnalysisProfile) -> field_guard::error::Result<()> {
//! let formatter = HumanFormatter::with_config(FormatterConfig::ci());
//! println!("{}", formatter.format(profile)?);
//! # Ok(())
//! # }
//! ```

use std::fmt::Write;

use crate::analyzers::profile::{
    AnalysisProfile, ColumnProfile, ProfileStatus, RuleStrength, TypeSummary,
};
use crate::error::{EngineError, Result};

/// Configuration options for formatting profiles.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include per-column profiles
    pub include_columns: bool,
    /// Include relationship edges
    pub include_relationships: bool,
    /// Include individual outlier findings
    pub include_outliers: bool,
    /// Include synthesized rules
    pub include_rules: bool,
    /// Include skipped-unit diagnostics
    pub include_diagnostics: bool,
    /// Maximum entries shown per list (`None` for all)
    pub max_items: Option<usize>,
    /// Whether to use colorized output (for human formatter)
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_columns: true,
            include_relationships: true,
            include_outliers: true,
            include_rules: true,
            include_diagnostics: true,
            max_items: None,
            use_colors: true,
        }
    }
}

impl FormatterConfig {
    /// Dataset summary and rules only.
    pub fn minimal() -> Self {
        Self {
            include_columns: false,
            include_relationships: false,
            include_outliers: false,
            include_rules: true,
            include_diagnostics: false,
            max_items: None,
            use_colors: false,
        }
    }

    /// Everything, uncapped.
    pub fn detailed() -> Self {
        Self::default()
    }

    /// A configuration suitable for CI/CD logs.
    pub fn ci() -> Self {
        Self {
            max_items: Some(50),
            use_colors: false,
            ..Self::default()
        }
    }

    pub fn with_rules(mut self, include: bool) -> Self {
        self.include_rules = include;
        self
    }

    pub fn with_outliers(mut self, include: bool) -> Self {
        self.include_outliers = include;
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn cap(&self, len: usize) -> usize {
        self.max_items.map_or(len, |max| max.min(len))
    }
}

/// Trait for rendering a profile into an output format.
pub trait ProfileFormatter {
    fn format(&self, profile: &AnalysisProfile) -> Result<String>;

    /// Formats with an explicit configuration instead of the formatter's own.
    fn format_with_config(
        &self,
        profile: &AnalysisProfile,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(profile)
    }
}

fn write_error(err: std::fmt::Error) -> EngineError {
    EngineError::internal(format!("failed to render profile: {err}"))
}

/// Formats profiles as JSON, dropping the sections the configuration excludes.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileFormatter for JsonFormatter {
    fn format(&self, profile: &AnalysisProfile) -> Result<String> {
        self.format_with_config(profile, &self.config)
    }

    fn format_with_config(
        &self,
        profile: &AnalysisProfile,
        config: &FormatterConfig,
    ) -> Result<String> {
        let filtered = filter_profile(profile, config);
        if self.pretty {
            filtered.to_json_pretty()
        } else {
            filtered.to_json()
        }
    }
}

/// Console output: a summary block followed by one section per included part.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn paint(&self, config: &FormatterConfig, text: &str, code: &str) -> String {
        if config.use_colors {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn render(
        &self,
        out: &mut String,
        profile: &AnalysisProfile,
        config: &FormatterConfig,
    ) -> std::fmt::Result {
        let summary = &profile.dataset;
        writeln!(out)?;
        match profile.status {
            ProfileStatus::Complete => {
                writeln!(out, "{}", self.paint(config, "Analysis complete", "32"))?
            }
            ProfileStatus::Cancelled => writeln!(
                out,
                "{}",
                self.paint(config, "Analysis cancelled (partial profile)", "33")
            )?,
        }
        writeln!(out)?;
        writeln!(out, "Dataset: {} ({})", summary.name, summary.fingerprint)?;
        writeln!(out, "   Rows: {}", summary.row_count)?;
        writeln!(out, "   Columns: {}", summary.column_count)?;
        writeln!(out, "   Completeness: {:.1}%", summary.completeness * 100.0)?;
        if let Some(duplicates) = &summary.duplicates {
            writeln!(
                out,
                "   Duplicate rows: {} in {} groups",
                duplicates.duplicated_rows, duplicates.duplicate_groups
            )?;
        }
        writeln!(out, "   Isolation seed: {}", profile.isolation_seed)?;

        if config.include_columns {
            writeln!(out)?;
            writeln!(out, "Columns:")?;
            for column in &profile.columns[..config.cap(profile.columns.len())] {
                writeln!(
                    out,
                    "   {} [{}] missing {:.1}%, {} distinct{}",
                    column.name,
                    column.semantic_type,
                    column.missing_ratio * 100.0,
                    column.distinct_count,
                    summary_line(column)
                )?;
            }
        }

        if config.include_relationships && !profile.relationships.is_empty() {
            writeln!(out)?;
            writeln!(out, "Relationships:")?;
            for edge in &profile.relationships[..config.cap(profile.relationships.len())] {
                let marker = if edge.significant { "*" } else { " " };
                writeln!(
                    out,
                    "  {marker}{} ~ {} {} = {:.3} (n = {})",
                    edge.column_a, edge.column_b, edge.kind, edge.value, edge.sample_size
                )?;
            }
        }

        if config.include_outliers && !profile.outliers.is_empty() {
            writeln!(out)?;
            writeln!(out, "Outliers:")?;
            let shown = config.cap(profile.outliers.len());
            for finding in &profile.outliers[..shown] {
                writeln!(
                    out,
                    "   {} row {}: {} ({} severity {:.2})",
                    finding.column, finding.row_index, finding.value, finding.method, finding.severity
                )?;
            }
            if profile.outliers.len() > shown {
                writeln!(out, "   ... and {} more", profile.outliers.len() - shown)?;
            }
        }

        if config.include_rules && !profile.rules.is_empty() {
            writeln!(out)?;
            writeln!(out, "Rules:")?;
            let shown = config.cap(profile.rules.len());
            for rule in &profile.rules[..shown] {
                let tag = match rule.strength {
                    RuleStrength::Enforced => self.paint(config, "must", "32"),
                    RuleStrength::Advisory => self.paint(config, "note", "33"),
                };
                writeln!(out, "   [{tag}] {}", rule.statement)?;
            }
            if profile.rules.len() > shown {
                writeln!(out, "   ... and {} more rules", profile.rules.len() - shown)?;
            }
        }

        if config.include_diagnostics && !profile.diagnostics.is_empty() {
            writeln!(out)?;
            writeln!(out, "Skipped units:")?;
            for diagnostic in &profile.diagnostics[..config.cap(profile.diagnostics.len())] {
                writeln!(out, "   {}: {}", diagnostic.unit, diagnostic.reason)?;
            }
        }
        writeln!(out)
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileFormatter for HumanFormatter {
    fn format(&self, profile: &AnalysisProfile) -> Result<String> {
        self.format_with_config(profile, &self.config)
    }

    fn format_with_config(
        &self,
        profile: &AnalysisProfile,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        self.render(&mut output, profile, config).map_err(write_error)?;
        Ok(output)
    }
}

/// Markdown report with tables for columns and rules.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level for the output.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 5);
        self
    }

    fn render(
        &self,
        out: &mut String,
        profile: &AnalysisProfile,
        config: &FormatterConfig,
    ) -> std::fmt::Result {
        let h = "#".repeat(self.heading_level as usize);
        let summary = &profile.dataset;
        writeln!(out, "{h} Profile: {}", summary.name)?;
        writeln!(out)?;
        if profile.status == ProfileStatus::Cancelled {
            writeln!(out, "> **Note:** the run was cancelled; this profile is partial.")?;
            writeln!(out)?;
        }
        writeln!(out, "| Metric | Value |")?;
        writeln!(out, "|--------|-------|")?;
        writeln!(out, "| Fingerprint | `{}` |", summary.fingerprint)?;
        writeln!(out, "| Rows | {} |", summary.row_count)?;
        writeln!(out, "| Columns | {} |", summary.column_count)?;
        writeln!(out, "| Completeness | {:.1}% |", summary.completeness * 100.0)?;
        if let Some(duplicates) = &summary.duplicates {
            writeln!(out, "| Duplicate rows | {} |", duplicates.duplicated_rows)?;
        }

        if config.include_columns {
            writeln!(out)?;
            writeln!(out, "{h}# Columns")?;
            writeln!(out)?;
            writeln!(out, "| Column | Type | Missing | Distinct |")?;
            writeln!(out, "|--------|------|---------|----------|")?;
            for column in &profile.columns[..config.cap(profile.columns.len())] {
                writeln!(
                    out,
                    "| {} | {} | {:.1}% | {} |",
                    escape_cell(&column.name),
                    column.semantic_type,
                    column.missing_ratio * 100.0,
                    column.distinct_count
                )?;
            }
        }

        if config.include_outliers && !profile.outliers.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Outliers")?;
            writeln!(out)?;
            writeln!(out, "| Column | Row | Value | Method | Severity |")?;
            writeln!(out, "|--------|-----|-------|--------|----------|")?;
            for finding in &profile.outliers[..config.cap(profile.outliers.len())] {
                writeln!(
                    out,
                    "| {} | {} | {} | {} | {:.2} |",
                    escape_cell(&finding.column),
                    finding.row_index,
                    escape_cell(&finding.value.to_string()),
                    finding.method,
                    finding.severity
                )?;
            }
        }

        if config.include_rules && !profile.rules.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Rules")?;
            writeln!(out)?;
            for rule in &profile.rules[..config.cap(profile.rules.len())] {
                let strength = match rule.strength {
                    RuleStrength::Enforced => "enforced",
                    RuleStrength::Advisory => "advisory",
                };
                writeln!(out, "- **{}** ({strength}): {}", rule.kind, rule.statement)?;
            }
        }

        if config.include_diagnostics && !profile.diagnostics.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Skipped units")?;
            writeln!(out)?;
            for diagnostic in &profile.diagnostics[..config.cap(profile.diagnostics.len())] {
                writeln!(out, "- `{}`: {}", diagnostic.unit, diagnostic.reason)?;
            }
        }
        Ok(())
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileFormatter for MarkdownFormatter {
    fn format(&self, profile: &AnalysisProfile) -> Result<String> {
        self.format_with_config(profile, &self.config)
    }

    fn format_with_config(
        &self,
        profile: &AnalysisProfile,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        self.render(&mut output, profile, config).map_err(write_error)?;
        Ok(output)
    }
}

/// Short type-specific addendum for the human column listing.
fn summary_line(column: &ColumnProfile) -> String {
    match &column.summary {
        TypeSummary::Numeric(s) => format!(", range [{}, {}], mean {:.3}", s.min, s.max, s.mean),
        TypeSummary::Boolean(t) | TypeSummary::Categorical(t) => {
            format!(", top: {}", t.values().into_iter().take(3).collect::<Vec<_>>().join(", "))
        }
        TypeSummary::Datetime(s) => format!(", {} to {}", s.min, s.max),
        TypeSummary::Text(s) => format!(", length {}..{}", s.min_length, s.max_length),
        TypeSummary::None => String::new(),
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Copies the profile without the sections the configuration excludes.
fn filter_profile(profile: &AnalysisProfile, config: &FormatterConfig) -> AnalysisProfile {
    let mut filtered = profile.clone();
    let keep = |len: usize, include: bool| if include { config.cap(len) } else { 0 };

    filtered.columns.truncate(keep(profile.columns.len(), config.include_columns));
    filtered
        .relationships
        .truncate(keep(profile.relationships.len(), config.include_relationships));
    filtered.outliers.truncate(keep(profile.outliers.len(), config.include_outliers));
    filtered.rules.truncate(keep(profile.rules.len(), config.include_rules));
    filtered
        .diagnostics
        .truncate(keep(profile.diagnostics.len(), config.include_diagnostics));
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::AnalysisRunner;
    use crate::test_fixtures::{deterministic_config, orders_dataset};

    fn profile() -> AnalysisProfile {
        AnalysisRunner::new(deterministic_config())
            .run(&orders_dataset())
            .unwrap()
    }

    #[test]
    fn test_formatter_config() {
        let config = FormatterConfig::default();
        assert!(config.include_rules);
        assert!(config.use_colors);

        let minimal = FormatterConfig::minimal();
        assert!(!minimal.include_columns);
        assert!(!minimal.use_colors);

        let ci = FormatterConfig::ci();
        assert!(!ci.use_colors);
        assert_eq!(ci.max_items, Some(50));
    }

    #[test]
    fn test_json_formatter() {
        let profile = profile();
        let output = JsonFormatter::new().format(&profile).unwrap();
        assert!(output.contains("\"status\": \"complete\""));
        let parsed = AnalysisProfile::from_json(&output).unwrap();
        assert_eq!(parsed.columns.len(), profile.columns.len());
        assert_eq!(parsed.outliers.len(), profile.outliers.len());

        let output = JsonFormatter::new()
            .with_pretty(false)
            .format_with_config(&profile, &FormatterConfig::minimal())
            .unwrap();
        let parsed = AnalysisProfile::from_json(&output).unwrap();
        assert!(parsed.columns.is_empty());
        assert!(parsed.outliers.is_empty());
        assert_eq!(parsed.rules.len(), profile.rules.len());
    }

    #[test]
    fn test_human_formatter() {
        let profile = profile();
        let output = HumanFormatter::new().format(&profile).unwrap();
        assert!(output.contains("Analysis complete"));
        assert!(output.contains("Dataset: orders"));
        assert!(output.contains("amount [numeric]"));

        let config = FormatterConfig::default().with_colors(false);
        let output = HumanFormatter::new().format_with_config(&profile, &config).unwrap();
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_markdown_formatter() {
        let profile = profile();
        let output = MarkdownFormatter::new().format(&profile).unwrap();
        assert!(output.starts_with("## Profile: orders"));
        assert!(output.contains("| Rows | 12 |"));
        assert!(output.contains("### Rules"));

        let output = MarkdownFormatter::new()
            .with_heading_level(1)
            .format(&profile)
            .unwrap();
        assert!(output.starts_with("# Profile: orders"));
    }

    #[test]
    fn test_max_items_caps_lists() {
        let profile = profile();
        let config = FormatterConfig::default().with_colors(false).with_max_items(1);
        let output = HumanFormatter::new().format_with_config(&profile, &config).unwrap();
        assert!(output.contains("more rules"));
    }
}
