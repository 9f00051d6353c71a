//! Console output: per-pass progress bars, event lines and the final summary.

use anyhow::Result;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use recarve_core::{CarveEvent, CarveSummary};
use std::path::Path;
use std::time::Duration;

pub struct Reporter {
    style: ProgressStyle,
    bar: Option<ProgressBar>,
    headers_found: u64,
    groups_created: u64,
}

impl Reporter {
    pub fn new() -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:50.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-");
        Ok(Self {
            style,
            bar: None,
            headers_found: 0,
            groups_created: 0,
        })
    }

    pub fn handle(&mut self, event: &CarveEvent<'_>) {
        match event {
            CarveEvent::PassStarted {
                signature,
                source_size,
            } => {
                println!("\nScanning for {} files...", signature);
                let bar = ProgressBar::new(*source_size);
                bar.set_style(self.style.clone());
                self.bar = Some(bar);
            }
            CarveEvent::HeaderFound { signature, offset } => {
                self.headers_found += 1;
                self.line(format!("Found {} signature at offset: {:#x}", signature, offset));
            }
            CarveEvent::GroupCreated(group) => {
                self.groups_created += 1;
                self.line(format!("Created new group: {}", group.id()));
            }
            CarveEvent::FileRecovered(file) => {
                let note = if file.truncated { " (truncated)" } else { "" };
                self.line(format!(
                    "Recovered file: {} [{}]{}",
                    file.path.display(),
                    format_size(file.length, BINARY),
                    note
                ));
            }
            CarveEvent::Progress { offset, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(*offset);
                }
            }
            CarveEvent::PassFinished(pass) => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                println!(
                    "Recovered {} {} files",
                    pass.recovered(),
                    pass.format().to_uppercase()
                );
            }
        }
    }

    /// Drops a progress bar left behind by an aborted pass.
    pub fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }

    /// Prints above the progress bar when one is active.
    fn line(&self, text: String) {
        match &self.bar {
            Some(bar) => bar.println(text),
            None => println!("{}", text),
        }
    }

    #[must_use]
    pub fn headers_found(&self) -> u64 {
        self.headers_found
    }

    #[must_use]
    pub fn groups_created(&self) -> u64 {
        self.groups_created
    }
}

pub fn print_summary(
    summary: &CarveSummary,
    reporter: &Reporter,
    device_size: u64,
    output_dir: &Path,
    elapsed: Duration,
) {
    if summary.cancelled() {
        println!("\nRecovery stopped by user");
    }

    let recovered_bytes: u64 = summary.files().map(|f| f.length).sum();

    println!("\n╔════════════════════════════════════════╗");
    if summary.cancelled() {
        println!("║       === Recovery Interrupted ===     ║");
    } else {
        println!("║        === Recovery Finished ===       ║");
    }
    println!("╠════════════════════════════════════════╣");
    println!(
        "║ Elapsed Time:       {:>18} ║",
        format!("{:.1}s", elapsed.as_secs_f64())
    );
    println!(
        "║ Device Size:        {:>18} ║",
        format_size(device_size, BINARY)
    );
    println!("║ Headers Found:      {:>18} ║", reporter.headers_found());
    println!("║ Groups Created:     {:>18} ║", reporter.groups_created());
    println!("╠════════════════════════════════════════╣");
    for pass in summary.passes() {
        println!(
            "║ {:<19} {:>18} ║",
            format!("{} files:", pass.format().to_uppercase()),
            pass_counts(pass.recovered(), pass.truncated())
        );
    }
    println!("║ Truncated Files:    {:>18} ║", summary.truncated());
    println!(
        "║ Recovered Data:     {:>18} ║",
        format_size(recovered_bytes, BINARY)
    );
    println!("╠════════════════════════════════════════╣");
    println!("║ Files saved to:     {:<18} ║", output_dir.display());
    println!("╚════════════════════════════════════════╝");
    println!(
        "\nRecovery complete! Total files recovered: {}",
        summary.total()
    );
}

/// Closing line for a run that ended in an error.
pub fn print_partial(recovered: u64, output_dir: &Path) {
    println!(
        "\nRecovery complete! Total files recovered: {} (saved to {})",
        recovered,
        output_dir.display()
    );
}

fn pass_counts(recovered: usize, truncated: usize) -> String {
    if truncated == 0 {
        recovered.to_string()
    } else {
        format!("{} ({} partial)", recovered, truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recarve_core::{CarveConfig, CarvingEngine, MemorySink, Selection, SignatureRegistry};
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_counts_headers_and_groups() {
        let mut data = vec![0u8; 4096];
        for k in 0..5 {
            data[k * 800 + 10..k * 800 + 13].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        }
        let registry = SignatureRegistry::builtin();
        let signatures = registry
            .signatures_for(&Selection::Format("jpg".into()))
            .unwrap();
        let mut engine =
            CarvingEngine::new(CarveConfig::default(), "/out", MemorySink::new()).unwrap();
        let running = AtomicBool::new(true);

        let mut reporter = Reporter::new().unwrap();
        let summary = engine
            .run(&mut data, &signatures, &running, &mut |event| {
                reporter.handle(event)
            })
            .unwrap();

        assert_eq!(summary.total() as u64, reporter.headers_found());
        assert!(reporter.groups_created() >= 1);
        assert!(reporter.bar.is_none());
    }

    #[test]
    fn test_pass_counts_mention_partial_files() {
        assert_eq!(pass_counts(3, 0), "3");
        assert_eq!(pass_counts(3, 1), "3 (1 partial)");
    }
}
