//! Run statistics and summary output.

use std::time::Duration;

use observability::StageSummary;
use pipeline::MetricsSnapshot;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Items accepted by the pipeline input
    pub fed: u64,

    /// Items read from the pipeline output
    pub received: u64,

    /// Outputs that differed from the sequential result
    pub mismatches: u64,

    /// Items skipped because a transform failed, summed over stages
    pub failures: u64,

    /// Last item read from the output
    pub last_output: Option<i64>,

    /// Whether the pause/resume cycle ran
    pub paused: bool,

    /// Whether the run ended by timeout
    pub timed_out: bool,

    /// Total duration of the run
    pub duration: Duration,

    /// Final per-stage metrics, in pipeline order
    pub stages: Vec<(String, MetricsSnapshot)>,

    /// Latency summaries of measured stages
    pub latency: Vec<StageSummary>,
}

impl RunStats {
    /// Output items per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Items fed but never received (failed or in flight at stop)
    pub fn lost(&self) -> u64 {
        self.fed.saturating_sub(self.received)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Items fed: {}", self.fed);
        println!("   ├─ Items received: {}", self.received);
        println!("   ├─ Items lost: {} ({} failed)", self.lost(), self.failures);
        println!("   ├─ Throughput: {:.2} items/s", self.throughput());
        match self.last_output {
            Some(value) => println!("   ├─ Last output: {value}"),
            None => println!("   ├─ Last output: -"),
        }
        println!("   ├─ Paused: {}", if self.paused { "yes" } else { "no" });
        println!("   └─ Timed out: {}", if self.timed_out { "yes" } else { "no" });

        if !self.stages.is_empty() {
            println!("\n📈 Stages");
            let last = self.stages.len() - 1;
            for (i, (name, metrics)) in self.stages.iter().enumerate() {
                let branch = if i == last { "└─" } else { "├─" };
                println!(
                    "   {} {}: processed={}, failed={}, dropped_measurements={}, mean_latency={:.3}ms",
                    branch,
                    name,
                    metrics.processed_count,
                    metrics.failure_count,
                    metrics.dropped_measurements,
                    metrics.mean_latency.as_secs_f64() * 1000.0
                );
            }
        }

        if !self.latency.is_empty() {
            println!("\n⏱️  Measured Latency");
            for summary in &self.latency {
                println!("   - {summary}");
            }
        }

        if self.mismatches > 0 {
            println!("\n⚠️  {} outputs differed from the expected sequence", self.mismatches);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_and_lost() {
        let stats = RunStats {
            fed: 100,
            received: 90,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.throughput() - 45.0).abs() < f64::EPSILON);
        assert_eq!(stats.lost(), 10);

        let empty = RunStats::default();
        assert_eq!(empty.throughput(), 0.0);
        assert_eq!(empty.lost(), 0);
    }
}
