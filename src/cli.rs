//! Interface de linha de comando do scriptor baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (create, batch,
//! config) e flags globais (--config, --model, --max-retries, --verbose).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use crate::agent::Platform;

/// scriptor: gera conteúdo por plataforma com um loop de ferramentas.
#[derive(Debug, Parser)]
#[command(name = "scriptor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração.
    #[arg(long, global = true, default_value = "scriptor.toml")]
    pub config: PathBuf,

    /// Modelo a usar nesta sessão (sobrepõe o arquivo).
    #[arg(long, global = true)]
    pub model: Option<ModelArg>,

    /// Número máximo de retentativas de cada chamada ao modelo.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Modelos aceitos pela CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelArg {
    /// Rápido e econômico.
    Haiku,
    /// Equilibrado, o padrão.
    Sonnet,
    /// Mais capaz, mais lento.
    Opus,
}

impl ModelArg {
    /// Identificador do modelo na API Anthropic.
    pub fn api_id(self) -> &'static str {
        match self {
            ModelArg::Haiku => "claude-haiku-4-5-20251001",
            ModelArg::Sonnet => "claude-sonnet-4-5-20250929",
            ModelArg::Opus => "claude-opus-4-6",
        }
    }
}

/// Plataformas aceitas pela CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlatformArg {
    Linkedin,
    #[value(alias = "x")]
    Twitter,
    Threads,
    Instagram,
    #[value(name = "youtube-short", alias = "youtube")]
    YoutubeShort,
    Newsletter,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Linkedin => Platform::LinkedIn,
            PlatformArg::Twitter => Platform::Twitter,
            PlatformArg::Threads => Platform::Threads,
            PlatformArg::Instagram => Platform::Instagram,
            PlatformArg::YoutubeShort => Platform::YoutubeShort,
            PlatformArg::Newsletter => Platform::Newsletter,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Gera um post único sobre o tema dado.
    Create {
        /// Tema do post.
        topic: String,

        #[arg(long, short, value_enum, default_value = "linkedin")]
        platform: PlatformArg,

        /// Contexto extra (fatos, números, links) para o brief.
        #[arg(long, default_value = "")]
        context: String,

        /// Nome do estilo de escrita.
        #[arg(long)]
        style: Option<String>,

        /// Ativa a rodada de validação e correção.
        #[arg(long, default_value_t = false)]
        thinking: bool,

        /// Data de publicação (AAAA-MM-DD); o registro fica "scheduled".
        #[arg(long)]
        publish_date: Option<NaiveDate>,

        /// Imprime a resposta em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Executa um lote de jobs de um arquivo JSON ou TOML.
    Batch {
        /// Caminho para o arquivo com as definições de job.
        #[arg(long)]
        file: PathBuf,

        /// Imprime o relatório em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Mostra a configuração efetiva.
    Config,
}
