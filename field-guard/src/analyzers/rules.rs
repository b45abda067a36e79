//! Rule synthesis: turns a finished profile into per-field validation rules.
//!
//! The synthesizer is a pure transform over an [`AnalysisProfile`]. Each
//! [`SynthesisRule`] looks at one column profile and emits zero or more
//! [`ValidationRule`]s; relationship rules are derived from the profile's edges.
//!
//! Output order is fixed: columns in dataset order, rules in registration order
//! within a column, relationship rules last ordered by column pair. Parameters live
//! in ordered maps, so serializing the same profile's rules twice yields identical
//! bytes.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use field_guard::analyzers::{RuleSynthesizer, NullabilityRule, RangeRule};
//!
//! let synthesizer = RuleSynthesizer::new()
//!     .add_rule(Box::new(RangeRule::new()))
//!     .add_rule(Box::new(NullabilityRule::new()));
//!
//! for rule in synthesizer.synthesize(&profile) {
//!     println!("{}: {}", rule.field, rule.statement);
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use crate::analyzers::inference::SemanticType;
use crate::analyzers::profile::{
    AnalysisProfile, ColumnProfile, OutlierFinding, OutlierMethod, RelationshipEdge,
    RelationshipKind, RuleKind, RuleStrength, TypeSummary, ValidationRule,
};
use crate::config::AnalysisConfig;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read-only view of the profile handed to every rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    profile: &'a AnalysisProfile,
}

impl<'a> RuleContext<'a> {
    pub fn new(profile: &'a AnalysisProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &'a AnalysisProfile {
        self.profile
    }

    /// Outlier findings recorded against `column`.
    pub fn outliers_for(&self, column: &str) -> impl Iterator<Item = &'a OutlierFinding> + 'a {
        let column = column.to_string();
        self.profile
            .outliers
            .iter()
            .filter(move |finding| finding.column == column)
    }
}

/// One rule-derivation concern.
pub trait SynthesisRule: Send + Sync {
    /// Derives rules for one column. Never called for `unknown` columns.
    fn apply(&self, column: &ColumnProfile, context: &RuleContext<'_>) -> Vec<ValidationRule>;

    fn name(&self) -> &str;

    fn description(&self) -> &str;
}

/// Applies the registered rules to every column, then derives relationship rules.
pub struct RuleSynthesizer {
    rules: Vec<Box<dyn SynthesisRule>>,
    relationships: RelationshipRule,
}

impl RuleSynthesizer {
    /// An empty synthesizer; relationship rules use the default thresholds.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            relationships: RelationshipRule::default(),
        }
    }

    /// The standard rule set, configured from `config`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new()
            .add_rule(Box::new(TypeConstraintRule::new()))
            .add_rule(Box::new(DecimalRule::new()))
            .add_rule(Box::new(RangeRule::new()))
            .add_rule(Box::new(NullabilityRule::new()))
            .add_rule(Box::new(EnumerationRule::with_cap(config.max_enumerated_values)))
            .add_rule(Box::new(LengthRule::new()))
            .add_rule(Box::new(CharacterClassRule::with_allowed(
                &config.allowed_text_characters,
            )))
            .add_rule(Box::new(DigitRule::new()))
            .add_rule(Box::new(DistinctValuesRule::new()))
            .add_rule(Box::new(DatetimeFormatRule::new()))
            .add_rule(Box::new(OutlierAdvisoryRule::new()))
            .relationship_rule(RelationshipRule::with_thresholds(
                config.correlation_strength_threshold,
                config.association_strength_threshold,
            ))
    }

    pub fn add_rule(mut self, rule: Box<dyn SynthesisRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn relationship_rule(mut self, rule: RelationshipRule) -> Self {
        self.relationships = rule;
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Derives every rule for `profile`. Existing `profile.rules` are ignored.
    #[instrument(skip_all, fields(dataset = %profile.dataset.name, columns = profile.columns.len()))]
    pub fn synthesize(&self, profile: &AnalysisProfile) -> Vec<ValidationRule> {
        let context = RuleContext::new(profile);
        let mut rules = Vec::new();

        for column in &profile.columns {
            if column.semantic_type == SemanticType::Unknown {
                debug!(column = %column.name, "Skipping rules for unknown column");
                continue;
            }
            for rule in &self.rules {
                let derived = rule.apply(column, &context);
                if !derived.is_empty() {
                    debug!(
                        column = %column.name,
                        rule = rule.name(),
                        count = derived.len(),
                        "Derived rules"
                    );
                }
                rules.extend(derived);
            }
        }

        let position: HashMap<&str, usize> = profile
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), i))
            .collect();
        let mut edges: Vec<&RelationshipEdge> = profile
            .relationships
            .iter()
            .filter(|edge| self.relationships.qualifies(edge))
            .collect();
        edges.sort_by_key(|edge| {
            (
                position.get(edge.column_a.as_str()).copied().unwrap_or(usize::MAX),
                position.get(edge.column_b.as_str()).copied().unwrap_or(usize::MAX),
                edge.kind == RelationshipKind::ChiSquare,
            )
        });
        rules.extend(edges.into_iter().map(|edge| self.relationships.derive(edge)));

        debug!(total = rules.len(), "Rule synthesis complete");
        rules
    }
}

impl Default for RuleSynthesizer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Formats a number without a trailing `.0` for whole values.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Every value parsed as the inferred type.
pub struct TypeConstraintRule;

impl TypeConstraintRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypeConstraintRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for TypeConstraintRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        let noun = match column.semantic_type {
            SemanticType::Numeric => "a number",
            SemanticType::Boolean => "a boolean",
            SemanticType::Datetime => "a date/time",
            SemanticType::Categorical => "a category label",
            SemanticType::Text => "text",
            SemanticType::Unknown => return Vec::new(),
        };
        let strength = if column.type_confidence >= 1.0 {
            RuleStrength::Enforced
        } else {
            RuleStrength::Advisory
        };
        let statement = match strength {
            RuleStrength::Enforced => format!("`{}` must be {noun}", column.name),
            RuleStrength::Advisory => format!(
                "`{}` should be {noun} ({} of observed values conform)",
                column.name,
                percent(column.type_confidence)
            ),
        };
        vec![
            ValidationRule::new(&column.name, RuleKind::TypeConstraint, strength, statement)
                .with_parameter("type", column.semantic_type.as_str())
                .with_parameter("confidence", column.type_confidence),
        ]
    }

    fn name(&self) -> &str {
        "type"
    }

    fn description(&self) -> &str {
        "Constrains values to the inferred semantic type"
    }
}

/// Whole-number numeric columns.
pub struct DecimalRule;

impl DecimalRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DecimalRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for DecimalRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        match &column.summary {
            TypeSummary::Numeric(stats) if stats.integral => vec![ValidationRule::new(
                &column.name,
                RuleKind::TypeConstraint,
                RuleStrength::Enforced,
                format!("`{}` must be a whole number", column.name),
            )
            .with_parameter("max_decimal_places", 0i64)],
            _ => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "decimals"
    }

    fn description(&self) -> &str {
        "Forbids fractional values in columns that only held whole numbers"
    }
}

/// Observed bounds of numeric and datetime columns.
pub struct RangeRule;

impl RangeRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RangeRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for RangeRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        match &column.summary {
            TypeSummary::Numeric(stats) => vec![ValidationRule::new(
                &column.name,
                RuleKind::Range,
                RuleStrength::Enforced,
                format!(
                    "`{}` must be between {} and {}",
                    column.name,
                    format_number(stats.min),
                    format_number(stats.max)
                ),
            )
            .with_parameter("min", stats.min)
            .with_parameter("max", stats.max)],
            TypeSummary::Datetime(stats) => {
                let min = stats.min.format(DATETIME_FORMAT).to_string();
                let max = stats.max.format(DATETIME_FORMAT).to_string();
                vec![ValidationRule::new(
                    &column.name,
                    RuleKind::Range,
                    RuleStrength::Enforced,
                    format!("`{}` must fall between {min} and {max}", column.name),
                )
                .with_parameter("min", min)
                .with_parameter("max", max)]
            }
            _ => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "range"
    }

    fn description(&self) -> &str {
        "Bounds values by the observed minimum and maximum"
    }
}

/// Missing values are disallowed when none were seen, otherwise noted.
pub struct NullabilityRule;

impl NullabilityRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullabilityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for NullabilityRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        if !matches!(
            column.semantic_type,
            SemanticType::Numeric | SemanticType::Categorical | SemanticType::Boolean
        ) {
            return Vec::new();
        }
        let rule = if column.missing_ratio == 0.0 {
            ValidationRule::new(
                &column.name,
                RuleKind::Nullability,
                RuleStrength::Enforced,
                format!("`{}` must not be missing", column.name),
            )
            .with_parameter("allow_missing", false)
        } else {
            ValidationRule::new(
                &column.name,
                RuleKind::Nullability,
                RuleStrength::Advisory,
                format!(
                    "`{}` may be missing ({} of rows observed missing)",
                    column.name,
                    percent(column.missing_ratio)
                ),
            )
            .with_parameter("allow_missing", true)
            .with_parameter("observed_missing_ratio", column.missing_ratio)
        };
        vec![rule]
    }

    fn name(&self) -> &str {
        "nullability"
    }

    fn description(&self) -> &str {
        "Forbids or flags missing values based on observed completeness"
    }
}

/// Closed value sets for categorical and boolean columns.
pub struct EnumerationRule {
    max_values: usize,
}

impl EnumerationRule {
    pub fn new() -> Self {
        Self::with_cap(50)
    }

    /// Value sets larger than `max_values` are reported as open.
    pub fn with_cap(max_values: usize) -> Self {
        Self { max_values }
    }
}

impl Default for EnumerationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for EnumerationRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        let table = match &column.summary {
            TypeSummary::Categorical(table) | TypeSummary::Boolean(table) => table,
            _ => return Vec::new(),
        };

        if table.distinct_values <= self.max_values && !table.is_truncated() {
            let values: Vec<String> = table.values().into_iter().map(str::to_string).collect();
            vec![ValidationRule::new(
                &column.name,
                RuleKind::Enumeration,
                RuleStrength::Enforced,
                format!("`{}` must be one of: {}", column.name, values.join(", ")),
            )
            .with_parameter("open", false)
            .with_parameter("values", values)]
        } else {
            vec![ValidationRule::new(
                &column.name,
                RuleKind::Enumeration,
                RuleStrength::Advisory,
                format!(
                    "`{}` has an open value set ({} distinct values)",
                    column.name, table.distinct_values
                ),
            )
            .with_parameter("open", true)
            .with_parameter("distinct_values", table.distinct_values)]
        }
    }

    fn name(&self) -> &str {
        "enumeration"
    }

    fn description(&self) -> &str {
        "Lists the allowed values of low-cardinality columns"
    }
}

/// Maximum observed length of text values.
pub struct LengthRule;

impl LengthRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LengthRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for LengthRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        let TypeSummary::Text(stats) = &column.summary else {
            return Vec::new();
        };
        vec![ValidationRule::new(
            &column.name,
            RuleKind::Length,
            RuleStrength::Enforced,
            format!(
                "`{}` must be at most {} characters long",
                column.name, stats.max_length
            ),
        )
        .with_parameter("max_length", stats.max_length)
        .with_parameter("observed_min_length", stats.min_length)]
    }

    fn name(&self) -> &str {
        "length"
    }

    fn description(&self) -> &str {
        "Caps text length at the observed maximum"
    }
}

/// Characters outside the allowed set in text columns.
pub struct CharacterClassRule {
    allowed_punctuation: String,
}

impl CharacterClassRule {
    pub fn new() -> Self {
        Self::with_allowed(crate::config::DEFAULT_ALLOWED_PUNCTUATION)
    }

    /// ASCII letters and digits plus `punctuation`.
    pub fn with_allowed(punctuation: &str) -> Self {
        Self {
            allowed_punctuation: punctuation.to_string(),
        }
    }
}

impl Default for CharacterClassRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for CharacterClassRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        let TypeSummary::Text(stats) = &column.summary else {
            return Vec::new();
        };
        let rule = if stats.disallowed_value_count == 0 {
            ValidationRule::new(
                &column.name,
                RuleKind::Pattern,
                RuleStrength::Enforced,
                format!(
                    "`{}` must contain only letters, digits and the characters {:?}",
                    column.name, self.allowed_punctuation
                ),
            )
        } else {
            let found: String = stats.disallowed_characters.iter().collect();
            ValidationRule::new(
                &column.name,
                RuleKind::Pattern,
                RuleStrength::Advisory,
                format!(
                    "`{}` has {} values with characters outside the allowed set: {found:?}",
                    column.name, stats.disallowed_value_count
                ),
            )
            .with_parameter("disallowed_characters", found)
            .with_parameter("disallowed_value_count", stats.disallowed_value_count)
        };
        vec![rule.with_parameter("allowed_punctuation", self.allowed_punctuation.as_str())]
    }

    fn name(&self) -> &str {
        "character_class"
    }

    fn description(&self) -> &str {
        "Checks text against the allowed character set"
    }
}

/// Whether text values may contain digits.
pub struct DigitRule;

impl DigitRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DigitRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for DigitRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        let TypeSummary::Text(stats) = &column.summary else {
            return Vec::new();
        };
        let rule = if stats.contains_digits {
            ValidationRule::new(
                &column.name,
                RuleKind::Pattern,
                RuleStrength::Advisory,
                format!("`{}` may contain digits", column.name),
            )
        } else {
            ValidationRule::new(
                &column.name,
                RuleKind::Pattern,
                RuleStrength::Enforced,
                format!("`{}` must not contain digits", column.name),
            )
        };
        vec![rule.with_parameter("digits_allowed", stats.contains_digits)]
    }

    fn name(&self) -> &str {
        "digits"
    }

    fn description(&self) -> &str {
        "Forbids digits in text columns that never contain them"
    }
}

/// Observed number of distinct text values, as an open value set.
pub struct DistinctValuesRule;

impl DistinctValuesRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DistinctValuesRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for DistinctValuesRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        if !matches!(column.summary, TypeSummary::Text(_)) {
            return Vec::new();
        }
        let mut rule = ValidationRule::new(
            &column.name,
            RuleKind::Enumeration,
            RuleStrength::Advisory,
            format!(
                "`{}` is free text with {} distinct values observed",
                column.name, column.distinct_count
            ),
        )
        .with_parameter("distinct_count", column.distinct_count)
        .with_parameter("open", true);
        if let Some(distinctness) = column.distinctness {
            rule = rule.with_parameter("distinctness", distinctness);
        }
        vec![rule]
    }

    fn name(&self) -> &str {
        "distinct_values"
    }

    fn description(&self) -> &str {
        "Reports the distinct-value count of text columns"
    }
}

/// The dominant date grammar of datetime columns.
pub struct DatetimeFormatRule;

impl DatetimeFormatRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DatetimeFormatRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for DatetimeFormatRule {
    fn apply(&self, column: &ColumnProfile, _context: &RuleContext<'_>) -> Vec<ValidationRule> {
        let TypeSummary::Datetime(stats) = &column.summary else {
            return Vec::new();
        };
        let pattern = stats.format.pattern();
        vec![ValidationRule::new(
            &column.name,
            RuleKind::Pattern,
            RuleStrength::Enforced,
            format!("`{}` must use the format {pattern}", column.name),
        )
        .with_parameter("format", pattern)]
    }

    fn name(&self) -> &str {
        "datetime_format"
    }

    fn description(&self) -> &str {
        "Pins datetime values to the dominant matched grammar"
    }
}

/// Flags numeric columns whose values tripped an outlier method.
pub struct OutlierAdvisoryRule;

impl OutlierAdvisoryRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OutlierAdvisoryRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisRule for OutlierAdvisoryRule {
    fn apply(&self, column: &ColumnProfile, context: &RuleContext<'_>) -> Vec<ValidationRule> {
        if column.semantic_type != SemanticType::Numeric {
            return Vec::new();
        }
        let mut counts: BTreeMap<OutlierMethod, usize> = BTreeMap::new();
        for finding in context.outliers_for(&column.name) {
            *counts.entry(finding.method).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return Vec::new();
        }

        let breakdown: Vec<String> = counts
            .iter()
            .map(|(method, count)| format!("{method}: {count}"))
            .collect();
        let mut rule = ValidationRule::new(
            &column.name,
            RuleKind::Range,
            RuleStrength::Advisory,
            format!(
                "`{}` has values flagged as outliers ({}); review before enforcing its range",
                column.name,
                breakdown.join(", ")
            ),
        );
        for (method, count) in counts {
            rule = rule.with_parameter(&format!("{}_outliers", method.as_str()), count);
        }
        vec![rule]
    }

    fn name(&self) -> &str {
        "outlier_advisory"
    }

    fn description(&self) -> &str {
        "Notes columns with statistically anomalous values"
    }
}

/// Derives relationship rules from strong pairwise statistics.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipRule {
    correlation_threshold: f64,
    association_threshold: f64,
}

impl RelationshipRule {
    pub fn with_thresholds(correlation_threshold: f64, association_threshold: f64) -> Self {
        Self {
            correlation_threshold,
            association_threshold,
        }
    }

    /// Correlations need `|r|` at the threshold; chi-square edges must also be significant.
    pub fn qualifies(&self, edge: &RelationshipEdge) -> bool {
        match edge.kind {
            RelationshipKind::PearsonCorrelation => edge.strength() >= self.correlation_threshold,
            RelationshipKind::ChiSquare => {
                edge.significant && edge.strength() >= self.association_threshold
            }
        }
    }

    fn derive(&self, edge: &RelationshipEdge) -> ValidationRule {
        let statement = match edge.kind {
            RelationshipKind::PearsonCorrelation => {
                let direction = if edge.value >= 0.0 { "positively" } else { "negatively" };
                format!(
                    "`{}` and `{}` are {direction} correlated (r = {:.3})",
                    edge.column_a, edge.column_b, edge.value
                )
            }
            RelationshipKind::ChiSquare => format!(
                "`{}` and `{}` are associated (Cramér's V = {:.3})",
                edge.column_a,
                edge.column_b,
                edge.strength()
            ),
        };
        let mut rule = ValidationRule::new(
            &edge.column_a,
            RuleKind::Relationship,
            RuleStrength::Advisory,
            statement,
        )
        .with_related_field(&edge.column_b)
        .with_parameter("statistic", edge.kind.to_string())
        .with_parameter("strength", edge.strength())
        .with_parameter("value", edge.value)
        .with_parameter("sample_size", edge.sample_size);
        if let Some(p) = edge.p_value {
            rule = rule.with_parameter("p_value", p);
        }
        rule
    }
}

impl Default for RelationshipRule {
    fn default() -> Self {
        Self::with_thresholds(0.7, 0.5)
    }
}
