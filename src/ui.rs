//! Interface de terminal do scriptor: spinner, avisos coloridos e relatórios.
//!
//! Usa `indicatif` para o spinner de progresso e `console` para as cores.
//! O [`ConsoleNotifier`] é o notificador usado quando nenhum webhook está
//! configurado: os avisos do lote aparecem acima do spinner.

use async_trait::async_trait;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{BatchReport, JobOutcome};
use crate::orchestrator::CreateContentResponse;
use crate::persist::{Notifier, StoreError};

/// Spinner de terminal que também recebe avisos do agendador.
///
/// Sucesso aparece em verde, falha em vermelho, pausa e checkpoint em
/// amarelo, o resto sem cor.
pub struct ConsoleNotifier {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl ConsoleNotifier {
    /// Inicia o spinner com a mensagem dada.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self::with_bar(pb, message)
    }

    fn with_bar(pb: ProgressBar, message: &str) -> Self {
        pb.set_message(message.to_string());
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Remove o spinner do terminal.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    // Escolhe o símbolo e a cor a partir do texto do aviso.
    fn styled(&self, text: &str) -> String {
        if text.contains(": failed") {
            format!("{} {text}", self.red.apply_to("✗"))
        } else if text.contains(": done") {
            format!("{} {text}", self.green.apply_to("✓"))
        } else if text.starts_with("Batch paused") || text.starts_with("Checkpoint") {
            format!("{} {text}", self.yellow.apply_to("⏸"))
        } else {
            format!("{} {text}", self.dim.apply_to("·"))
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn post_message(&self, _channel: Option<&str>, text: &str) -> Result<(), StoreError> {
        self.pb.println(self.styled(text));
        self.pb.set_message(text.to_string());
        Ok(())
    }
}

/// Imprime o resultado de um post único.
pub fn print_response(response: &CreateContentResponse) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    match response {
        CreateContentResponse::Success(content) => {
            let score = content
                .score
                .map(|s| format!("{s}/25"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {} {} post ready (score {score})",
                green.apply_to("✓"),
                content.platform
            );
            println!();
            println!("{}", content.content);
            println!();
            for issue in &content.issues {
                println!("  {} {}", yellow.apply_to("!"), issue.describe());
            }
            for link in &content.links {
                println!("  → {link}");
            }
            for caveat in &content.caveats {
                println!("  {} {caveat}", yellow.apply_to("⚠"));
            }
        }
        CreateContentResponse::Failure(failure) => {
            println!("  {} Generation failed: {failure}", red.apply_to("✗"));
        }
    }
}

/// Imprime o relatório do lote com um resumo colorido.
pub fn print_report(report: &BatchReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();

    println!();
    println!("─── Batch {} ───", report.plan_id);
    for (i, result) in report.results.iter().enumerate() {
        match &result.outcome {
            JobOutcome::Completed(content) => println!(
                "  {} {:>3}. [{}] {}  {}",
                green.apply_to("✓"),
                i + 1,
                result.platform,
                result.topic,
                content.preview
            ),
            JobOutcome::Failed(failure) => println!(
                "  {} {:>3}. [{}] {}  {failure}",
                red.apply_to("✗"),
                i + 1,
                result.platform,
                result.topic
            ),
        }
    }
    let style = if report.failed == 0 { &green } else { &red };
    println!();
    println!("{}", style.apply_to(&report.summary));
}
