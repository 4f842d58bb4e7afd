use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ideagate_provider::ProviderConfig;
use ideagate_schema::{Dimension, PerDimension};
use serde::{Deserialize, Serialize};

/// Positive weight per scored dimension. Weights need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(pub PerDimension<f64>);

impl Default for WeightTable {
    fn default() -> Self {
        Self(PerDimension {
            problem_strength: 0.25,
            market_opportunity: 0.20,
            differentiation_strength: 0.20,
            timing_readiness: 0.10,
            founder_leverage: 0.10,
            execution_feasibility: 0.15,
        })
    }
}

impl WeightTable {
    pub fn uniform() -> Self {
        Self(PerDimension::from_fn(|_| 1.0))
    }

    pub fn weight(&self, dimension: Dimension) -> f64 {
        *self.0.get(dimension)
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().map(|(_, w)| *w).sum()
    }

    /// `Σ value·w / Σ w` over all six dimensions.
    pub fn weighted_mean(&self, mut value: impl FnMut(Dimension) -> f64) -> f64 {
        let numerator: f64 = Dimension::ALL
            .into_iter()
            .map(|d| value(d) * self.weight(d))
            .sum();
        numerator / self.sum()
    }
}

/// Verdict rule thresholds, all on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictThresholds {
    pub kill_below_problem: u8,
    pub go_total: u8,
    pub go_min_differentiation: u8,
    pub refine_total: u8,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            kill_below_problem: 40,
            go_total: 80,
            go_min_differentiation: 55,
            refine_total: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per structured call; only schema-validation failures are retried.
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPolicy {
    /// `provider/model` or an alias.
    pub primary: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelPolicy {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub analysis: ModelPolicy,
    pub synthesis: ModelPolicy,
    pub simulation: ModelPolicy,
    pub summary: ModelPolicy,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            analysis: ModelPolicy::new("smart"),
            synthesis: ModelPolicy::new("smart"),
            simulation: ModelPolicy::new("smart"),
            summary: ModelPolicy {
                primary: "fast".into(),
                max_tokens: 256,
                temperature: Some(0.0),
            },
        }
    }
}

impl ModelsConfig {
    fn iter(&self) -> [(&'static str, &ModelPolicy); 4] {
        [
            ("analysis", &self.analysis),
            ("synthesis", &self.synthesis),
            ("simulation", &self.simulation),
            ("summary", &self.summary),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file, relative to the config root unless absolute.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/ideagate.db".into(),
        }
    }
}

fn default_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("smart".to_string(), "anthropic/claude-sonnet-4-5".to_string()),
        ("fast".to_string(), "anthropic/claude-3-5-haiku-latest".to_string()),
    ])
}

/// Contents of `main.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: WeightTable,
    pub verdict: VerdictThresholds,
    pub generation: GenerationConfig,
    pub models: ModelsConfig,
    pub aliases: HashMap<String, String>,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            verdict: VerdictThresholds::default(),
            generation: GenerationConfig::default(),
            models: ModelsConfig::default(),
            aliases: default_aliases(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdeagateConfig {
    pub root: PathBuf,
    pub engine: EngineConfig,
    pub providers: Vec<ProviderConfig>,
}

impl IdeagateConfig {
    pub fn store_path(&self) -> PathBuf {
        let path = Path::new(&self.engine.store.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `main.yaml` and `providers.d/*.yaml` from `root`. A missing
/// `main.yaml` yields the defaults; a missing `providers.d` yields no providers.
pub fn load_config(root: &Path) -> Result<IdeagateConfig> {
    let main_path = root.join("main.yaml");
    let engine: EngineConfig = if main_path.exists() {
        read_yaml_file(&main_path)?
    } else {
        tracing::debug!(path = %main_path.display(), "main.yaml not found, using defaults");
        EngineConfig::default()
    };

    let providers_dir = root.join("providers.d");
    let mut providers = if providers_dir.is_dir() {
        read_yaml_dir::<ProviderConfig>(&providers_dir)?
    } else {
        Vec::new()
    };
    resolve_providers_env(&mut providers);

    let config = IdeagateConfig {
        root: root.to_path_buf(),
        engine,
        providers,
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &IdeagateConfig) -> Result<()> {
    let engine = &config.engine;

    for (dimension, weight) in engine.weights.0.iter() {
        if !weight.is_finite() || *weight <= 0.0 {
            return Err(anyhow!(
                "weight for {} must be a positive number, got {weight}",
                dimension.key()
            ));
        }
    }

    let v = &engine.verdict;
    for (name, value) in [
        ("kill_below_problem", v.kill_below_problem),
        ("go_total", v.go_total),
        ("go_min_differentiation", v.go_min_differentiation),
        ("refine_total", v.refine_total),
    ] {
        if value > 100 {
            return Err(anyhow!("verdict.{name} must be within 0..=100, got {value}"));
        }
    }
    if v.refine_total > v.go_total {
        return Err(anyhow!(
            "verdict.refine_total ({}) must not exceed verdict.go_total ({})",
            v.refine_total,
            v.go_total
        ));
    }

    if engine.generation.max_attempts == 0 {
        return Err(anyhow!("generation.max_attempts must be at least 1"));
    }

    for (alias, target) in &engine.aliases {
        parse_provider_model(target)
            .with_context(|| format!("alias '{alias}' has an invalid target"))?;
    }
    for (role, policy) in engine.models.iter() {
        if policy.primary.contains('/') {
            parse_provider_model(&policy.primary)
                .with_context(|| format!("models.{role}.primary is invalid"))?;
        } else if !engine.aliases.contains_key(&policy.primary) {
            return Err(anyhow!(
                "models.{role}.primary refers to unknown alias: {}",
                policy.primary
            ));
        }
        if policy.max_tokens == 0 {
            return Err(anyhow!("models.{role}.max_tokens must be positive"));
        }
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.id.as_str()) {
            return Err(anyhow!("duplicate provider id: {}", provider.id));
        }
    }

    Ok(())
}

/// Split `provider/model`. Both halves must be non-empty.
pub fn parse_provider_model(input: &str) -> Result<(String, String)> {
    let (provider, model) = input
        .split_once('/')
        .ok_or_else(|| anyhow!("invalid model format: {input}"))?;
    if provider.trim().is_empty() || model.trim().is_empty() {
        return Err(anyhow!("invalid model format: {input}"));
    }
    Ok((provider.to_string(), model.to_string()))
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn read_yaml_dir<T>(dir: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read config dir: {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read dir entry: {}", dir.display()))?;
        let path = entry.path();
        if matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        ) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        items.push(read_yaml_file::<T>(&path)?);
    }
    Ok(items)
}

fn resolve_providers_env(providers: &mut [ProviderConfig]) {
    for provider in providers {
        provider.api_key = provider.api_key.as_deref().map(resolve_env_var);
        provider.base_url = provider.base_url.as_deref().map(resolve_env_var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideagate_provider::ProviderType;

    fn config(engine: EngineConfig) -> IdeagateConfig {
        IdeagateConfig {
            root: PathBuf::from("/tmp/ideagate"),
            engine,
            providers: vec![],
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = WeightTable::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(weights.weight(Dimension::ProblemStrength), 0.25);
    }

    #[test]
    fn weighted_mean_normalizes_by_sum() {
        let weights = WeightTable::uniform();
        let mean = weights.weighted_mean(|d| if d == Dimension::ProblemStrength { 60.0 } else { 0.0 });
        assert!((mean - 10.0).abs() < 1e-9);
    }

    #[test]
    fn defaults_validate() {
        assert!(validate_config(&config(EngineConfig::default())).is_ok());
    }

    #[test]
    fn partial_main_yaml_fills_defaults() {
        let engine: EngineConfig = serde_yaml::from_str(
            r#"
verdict:
  go_total: 85
generation:
  max_attempts: 5
"#,
        )
        .unwrap();
        assert_eq!(engine.verdict.go_total, 85);
        assert_eq!(engine.verdict.refine_total, 60);
        assert_eq!(engine.generation.max_attempts, 5);
        assert_eq!(engine.weights, WeightTable::default());
        assert_eq!(engine.models.summary.temperature, Some(0.0));
    }

    #[test]
    fn validate_rejects_non_positive_weight() {
        let mut engine = EngineConfig::default();
        engine.weights.0.timing_readiness = 0.0;
        let err = validate_config(&config(engine)).unwrap_err();
        assert!(err.to_string().contains("timing_readiness"));
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut engine = EngineConfig::default();
        engine.verdict.refine_total = 90;
        let err = validate_config(&config(engine)).unwrap_err();
        assert!(err.to_string().contains("refine_total"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut engine = EngineConfig::default();
        engine.generation.max_attempts = 0;
        assert!(validate_config(&config(engine)).is_err());
    }

    #[test]
    fn validate_rejects_unknown_alias_and_bad_model() {
        let mut engine = EngineConfig::default();
        engine.models.analysis.primary = "turbo".into();
        let err = validate_config(&config(engine)).unwrap_err();
        assert!(err.to_string().contains("unknown alias: turbo"));

        let mut engine = EngineConfig::default();
        engine.models.summary.primary = "openai/".into();
        assert!(validate_config(&config(engine)).is_err());
    }

    #[test]
    fn validate_rejects_duplicate_provider_ids() {
        let mut cfg = config(EngineConfig::default());
        cfg.providers = vec![
            ProviderConfig::new("anthropic", ProviderType::Anthropic),
            ProviderConfig::new("anthropic", ProviderType::Anthropic),
        ];
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn resolve_env_var_replaces_placeholders() {
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(resolve_env_var("${PATH}"), path);
        assert_eq!(resolve_env_var("plain"), "plain");
        assert_eq!(resolve_env_var("x_${UNCLOSED"), "x_${UNCLOSED");
        assert_eq!(resolve_env_var("v=${IDEAGATE_NONEXISTENT_VAR_XYZ}"), "v=");
    }

    #[test]
    fn load_config_reads_main_and_providers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("main.yaml"),
            "store:\n  path: ideas.db\naliases:\n  smart: openai/gpt-4o\n  fast: openai/gpt-4o-mini\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("providers.d")).unwrap();
        fs::write(
            dir.path().join("providers.d/openai.yaml"),
            "id: openai\ntype: openai\napi_key: sk-test\n",
        )
        .unwrap();
        fs::write(dir.path().join("providers.d/notes.txt"), "ignored").unwrap();

        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.store_path(), dir.path().join("ideas.db"));
        assert_eq!(cfg.engine.aliases["smart"], "openai/gpt-4o");
    }

    #[test]
    fn load_config_without_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.engine, EngineConfig::default());
    }
}
