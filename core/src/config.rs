use crate::{
    classifier::ClassifierConfig,
    denylist::DenylistEntry,
    rule_engine::{Comparison, PatternRule},
    rules::FraudRules,
    types::EntityKind,
};
use serde::Deserialize;

/// Everything the runner needs to wire an orchestrator.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub rules:         FraudRules,
    pub classifier:    ClassifierConfig,
    pub pattern_rules: Vec<PatternRule>,
    pub denylist:      Vec<DenylistEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternRulesFile {
    rules: Vec<PatternRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct DenylistFile {
    entries: Vec<DenylistEntry>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

impl RiskConfig {
    /// Load from the data/ directory.
    /// In tests, use RiskConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let rules: FraudRules = read_json(&format!("{data_dir}/rules/fraud_rules.json"))?;
        rules.validate()?;

        let classifier: ClassifierConfig =
            read_json(&format!("{data_dir}/classifier/weights.json"))?;

        let pattern_file: PatternRulesFile =
            read_json(&format!("{data_dir}/rules/pattern_rules.json"))?;

        // The denylist seed is optional; production mirrors load it elsewhere.
        let denylist_path = format!("{data_dir}/denylist/seed.json");
        let denylist = if std::path::Path::new(&denylist_path).exists() {
            read_json::<DenylistFile>(&denylist_path)?.entries
        } else {
            log::info!("no denylist seed at {denylist_path}, starting empty");
            Vec::new()
        };

        Ok(Self {
            rules,
            classifier,
            pattern_rules: pattern_file.rules,
            denylist,
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            rules: FraudRules::default(),
            classifier: ClassifierConfig {
                bias: -3.0,
                weights: [
                    ("is_premium_rate".to_string(),    2.5),
                    ("is_self_call".to_string(),       3.0),
                    ("is_short_call".to_string(),      1.0),
                    ("caller_reputation".to_string(), -1.5),
                    ("is_international".to_string(),   0.8),
                    ("is_free_mail".to_string(),       2.0),
                    ("has_valid_phone".to_string(),   -0.5),
                    ("email_digit_ratio".to_string(),  1.5),
                    ("is_suspicious_amount".to_string(), 1.2),
                    ("has_repeated_cents".to_string(), 0.6),
                ]
                .into(),
            },
            pattern_rules: vec![
                PatternRule {
                    name:       "premium_rate_destination".into(),
                    applies_to: Some(EntityKind::Call),
                    feature:    "is_premium_rate".into(),
                    op:         Comparison::Eq,
                    value:      1.0,
                    score:      0.65,
                },
                PatternRule {
                    name:       "oversized_bid".into(),
                    applies_to: Some(EntityKind::Bid),
                    feature:    "amount".into(),
                    op:         Comparison::Gt,
                    value:      500.0,
                    score:      0.5,
                },
                PatternRule {
                    name:       "brand_new_account".into(),
                    applies_to: Some(EntityKind::Account),
                    feature:    "account_age_days".into(),
                    op:         Comparison::Lt,
                    value:      1.0,
                    score:      0.3,
                },
            ],
            denylist: vec![DenylistEntry {
                kind:   "phone".into(),
                value:  "+19005550199".into(),
                reason: "known premium-rate pump number".into(),
            }],
        }
    }
}
