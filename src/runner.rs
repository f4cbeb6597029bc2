use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::constants::BATCH_ITEM_DELAY;

pub struct SequentialRunner {
    delay: Duration,
    progress: Option<ProgressBar>,
}

impl Default for SequentialRunner {
    fn default() -> Self {
        Self::new(BATCH_ITEM_DELAY)
    }
}

impl SequentialRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs `work` for every item in order. The pause sits between items,
    /// never after the last one.
    pub async fn run<T, O, F, Fut>(&self, items: Vec<T>, mut work: F) -> Vec<O>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = O>,
    {
        let mut outcomes = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            if idx > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            outcomes.push(work(item).await);
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }
        if let Some(progress) = &self.progress {
            progress.finish_with_message(format!("done: processed={}", outcomes.len()));
        }
        outcomes
    }
}

/// Progress bar in the house style, labelled with the batch name.
pub fn progress_bar(label: &str, total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let template =
        format!("{{spinner:.green}} [{label} {{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {{msg}}");
    if let Ok(style) = ProgressStyle::with_template(&template) {
        progress.set_style(style.progress_chars("=> "));
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn near(actual: Duration, ms: u64) -> bool {
        let want = Duration::from_millis(ms);
        actual >= want && actual < want + Duration::from_millis(20)
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_items_only() {
        let runner = SequentialRunner::new(Duration::from_millis(500));
        let started = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let out = runner
            .run(vec!["a", "b", "c"], |item| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push((item, started.elapsed()));
                    item.to_uppercase()
                }
            })
            .await;

        assert_eq!(out, vec!["A", "B", "C"]);
        let seen = seen.lock().unwrap().clone();
        let names: Vec<&str> = seen.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(seen[0].1, Duration::ZERO);
        assert!(near(seen[1].1, 500));
        assert!(near(seen[2].1, 1000));
        assert!(near(started.elapsed(), 1000));
    }

    #[tokio::test(start_paused = true)]
    async fn items_run_strictly_one_after_another() {
        let runner = SequentialRunner::new(Duration::from_millis(500));
        let started = Instant::now();

        let out = runner
            .run(vec![300u64, 100], |ms| async move {
                let begin = started.elapsed();
                tokio::time::sleep(Duration::from_millis(ms)).await;
                begin
            })
            .await;

        // second item starts after the first finished plus the pause
        assert_eq!(out[0], Duration::ZERO);
        assert!(near(out[1], 800));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_batch() {
        let runner = SequentialRunner::default();
        let out: Vec<Result<u32, String>> = runner
            .run(vec![1, 2, 3], |n| async move {
                if n == 2 { Err(format!("item {n} failed")) } else { Ok(n * 10) }
            })
            .await;

        assert_eq!(out, vec![Ok(10), Err("item 2 failed".to_string()), Ok(30)]);
    }
}
