//! Interface de terminal do bulkapply: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`RunProgress`] acompanha visualmente
//! uma execução no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::{BatchResult, StatusReport, Tally};
use crate::state_machine::{ApplicationRecord, ApplicationStatus};

/// Indicador visual de progresso para uma execução no terminal.
///
/// Exibe um spinner animado durante a execução e mensagens coloridas
/// para candidaturas enviadas (verde), falhas (vermelho) e pendentes (amarelo).
pub struct RunProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner com as palavras-chave da busca.
    pub fn start(keywords: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Applying to \"{keywords}\" postings..."));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resumo da execução.
    pub fn finish(&self, result: &BatchResult) {
        self.pb.finish_and_clear();
        println!(
            "  {} {} batch(es) executed: {}",
            self.green.apply_to("✓"),
            result.batches(),
            self.tally_line(&result.tally)
        );
        if result.cancelled {
            println!(
                "  {} Run cancelled; release pending records with `bulkapply abandon`",
                self.yellow.apply_to("!")
            );
        }
        for skipped in &result.skipped {
            println!(
                "  {} {} skipped: {}",
                self.yellow.apply_to("↷"),
                skipped.job_id,
                skipped.reason
            );
        }
        for (job_id, message) in result.failures() {
            println!("  {} {job_id}: {message}", self.red.apply_to("✗"));
        }
    }

    /// Finaliza o spinner após uma execução abortada.
    pub fn abort(&self, reason: &str) {
        self.pb.finish_and_clear();
        println!("  {} Run aborted: {reason}", self.red.apply_to("✗"));
    }

    fn tally_line(&self, tally: &Tally) -> String {
        format!(
            "{} total, {} applied, {} failed, {} pending",
            tally.total,
            self.green.apply_to(tally.applied),
            self.red.apply_to(tally.failed),
            self.yellow.apply_to(tally.pending)
        )
    }
}

/// Imprime o relatório de status em formato de tabela colorida.
pub fn print_status(report: &StatusReport) {
    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    println!(
        "{} total, {} applied, {} failed, {} pending",
        report.tally.total,
        green.apply_to(report.tally.applied),
        red.apply_to(report.tally.failed),
        yellow.apply_to(report.tally.pending)
    );
    println!();
    for record in &report.applications {
        let style = match record.status {
            ApplicationStatus::Applied => &green,
            ApplicationStatus::Failed => &red,
            ApplicationStatus::Pending => &yellow,
        };
        println!(
            "{:<8} {:<20} {} @ {}",
            style.apply_to(record.status),
            record.job_id,
            record.title,
            record.company
        );
        if let Some(detail) = detail_line(record) {
            println!("         {}", dim.apply_to(detail));
        }
    }
}

/// Lista as candidaturas abandonadas por `bulkapply abandon`.
pub fn print_abandoned(records: &[ApplicationRecord]) {
    let yellow = Style::new().yellow();
    if records.is_empty() {
        println!("No pending applications to abandon");
        return;
    }
    for record in records {
        println!(
            "  {} {} ({} @ {}), attempt {}",
            yellow.apply_to("↷"),
            record.job_id,
            record.title,
            record.company,
            record.attempt
        );
    }
    println!(
        "{} pending application(s) abandoned; the next run picks them up again",
        records.len()
    );
}

// Linha secundária: versão do documento ou causa da falha.
fn detail_line(record: &ApplicationRecord) -> Option<String> {
    match record.status {
        ApplicationStatus::Applied => record
            .resume_version
            .as_ref()
            .map(|version| format!("document {version}, attempt {}", record.attempt)),
        ApplicationStatus::Failed => record
            .error_message
            .as_ref()
            .map(|message| format!("{message} (attempt {})", record.attempt)),
        ApplicationStatus::Pending => None,
    }
}
