//! Configuração do scriptor carregada a partir de `scriptor.toml`.
//!
//! A struct [`ScriptorConfig`] contém todos os parâmetros configuráveis,
//! agrupados por seção (`[agent]`, `[retry]`, `[breaker]`, `[tools]`,
//! `[validation]`, `[detector]`, `[batch]`, `[notify]`). Valores não
//! presentes no arquivo usam defaults sensíveis. As variáveis de ambiente
//! `ANTHROPIC_API_KEY` e `DETECTOR_API_KEY` têm precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::resilience::RetryPolicy;

const CONFIG_FILE: &str = "scriptor.toml";

/// Configuração de nível superior carregada de `scriptor.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptorConfig {
    /// Chave da API Anthropic.
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Identificador do modelo usado pelo loop de geração.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub agent: AgentConfig,

    /// Política de retentativa das chamadas ao modelo.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Disjuntor por agente.
    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

// Valor padrão para o modelo.
fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

/// Limites do loop de ferramentas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Ciclos de ferramenta no modo padrão.
    pub max_iterations: u32,
    /// Ciclos de ferramenta no modo thinking.
    pub max_iterations_thinking: u32,
    /// Teto acumulado de tokens de saída por job.
    pub max_total_tokens: u32,
    /// Timeout da primeira chamada (prompt de sistema ainda sem cache).
    pub first_call_timeout_secs: u64,
    /// Timeout das chamadas seguintes.
    pub call_timeout_secs: u64,
    /// Aceita texto parcial quando a resposta para em `max_tokens`.
    pub accept_truncated: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_iterations_thinking: 15,
            max_total_tokens: 32_000,
            first_call_timeout_secs: 120,
            call_timeout_secs: 60,
            accept_truncated: true,
        }
    }
}

impl AgentConfig {
    pub fn iteration_cap(&self, thinking: bool) -> u32 {
        if thinking {
            self.max_iterations_thinking
        } else {
            self.max_iterations
        }
    }

    pub fn call_timeout(&self, first_call: bool) -> Duration {
        if first_call {
            Duration::from_secs(self.first_call_timeout_secs)
        } else {
            Duration::from_secs(self.call_timeout_secs)
        }
    }
}

/// Parâmetros do disjuntor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_secs: 60,
        }
    }
}

/// Níveis de timeout das ferramentas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Ferramentas de chamada única (correção, busca).
    pub short_timeout_secs: u64,
    /// Ferramenta composta de validação.
    pub long_timeout_secs: u64,
    /// Máximo de exemplos retornados por `search_examples`.
    pub search_limit: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            short_timeout_secs: 30,
            long_timeout_secs: 120,
            search_limit: 3,
        }
    }
}

/// Pesos multiplicadores dos cinco eixos da rubrica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisWeights {
    pub hook: f64,
    pub specificity: f64,
    pub voice: f64,
    pub structure: f64,
    pub platform_fit: f64,
}

impl Default for AxisWeights {
    fn default() -> Self {
        Self {
            hook: 1.0,
            specificity: 1.0,
            voice: 1.0,
            structure: 1.0,
            platform_fit: 1.0,
        }
    }
}

/// Constantes do avaliador por regras e da decisão pass/revise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Pontuação mínima (de 25) para aprovar.
    pub pass_threshold: u32,
    /// Faixa da penalidade por padrões de baixa qualidade.
    pub penalty_min: f64,
    pub penalty_max: f64,
    /// Timeout do avaliador por regras.
    pub scorer_timeout_secs: u64,
    /// Timeout da chamada ao detector externo.
    pub detector_timeout_secs: u64,
    pub weights: AxisWeights,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 18,
            penalty_min: 0.0,
            penalty_max: 5.0,
            scorer_timeout_secs: 10,
            detector_timeout_secs: 30,
            weights: AxisWeights::default(),
        }
    }
}

/// Detector externo de texto gerado por máquina. Desligado sem `endpoint`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// Parâmetros do agendador de lotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Tempo máximo de um job inteiro (rede de segurança do loop).
    pub job_timeout_secs: u64,
    /// Emite um checkpoint a cada N jobs.
    pub checkpoint_every: usize,
    /// Falhas consecutivas de job que pausam o lote.
    pub breaker_threshold: u32,
    /// Pausa antes de retomar o lote.
    pub cooldown_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 600,
            checkpoint_every: 10,
            breaker_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Destino dos avisos de progresso.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook compatível com Slack; sem ele os avisos vão para o terminal.
    pub webhook_url: Option<String>,
    /// Canal padrão quando o job não informa um.
    pub channel: Option<String>,
}

impl Default for ScriptorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            agent: AgentConfig::default(),
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
            tools: ToolsConfig::default(),
            validation: ValidationConfig::default(),
            detector: DetectorConfig::default(),
            batch: BatchConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl ScriptorConfig {
    /// Carrega a configuração de `scriptor.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ScriptorConfig>(&contents)
                .with_context(|| format!("invalid config in {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    // Variáveis de ambiente têm precedência sobre o arquivo para as chaves.
    fn apply_env(&mut self) {
        if let Some(key) = non_empty_env("ANTHROPIC_API_KEY") {
            self.api_key = key;
        }
        if let Some(key) = non_empty_env("DETECTOR_API_KEY") {
            self.detector.api_key = key;
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
