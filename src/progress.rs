use std::io;
use std::io::Write;
use std::sync::{Arc, atomic};
use std::sync::atomic::AtomicUsize;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

const BAR_WIDTH: usize = 70;

/// Terminal progress bar redrawn from its own thread while workers bump a shared counter.
pub struct ProgressBar {
    counter: Arc<AtomicUsize>,
    total: usize,
    updater_thread: Option<JoinHandle<()>>,
}

impl ProgressBar {
    pub fn start(total: usize) -> Self {
        let counter = Arc::new(AtomicUsize::new(0));
        let inner_counter = counter.clone();

        print!("[{: <70}]", "");

        let updater_thread = thread::spawn(move || {
            loop {
                let done = inner_counter.load(atomic::Ordering::Relaxed);
                let fraction = if total == 0 { 1.0 } else { done as f32 / total as f32 };

                print!(
                    "\r[{: <70}] {:.2}% ",
                    "#".repeat((fraction * BAR_WIDTH as f32).round() as usize),
                    fraction * 100.0
                );
                let _ = io::stdout().flush();

                if done >= total {
                    break;
                }

                thread::sleep(Duration::from_millis(100));
            }
        });

        Self {
            counter,
            total,
            updater_thread: Some(updater_thread),
        }
    }

    pub fn inc(&self) {
        self.counter.fetch_add(1, atomic::Ordering::Relaxed);
    }

    pub fn finish(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Force the counter to the end so the updater loop always terminates.
        self.counter.store(self.total, atomic::Ordering::Relaxed);

        if let Some(updater_thread) = self.updater_thread.take() {
            let _ = updater_thread.join();
            print!("{: <80}\r", "\r");
            let _ = io::stdout().flush();
        }
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        self.stop();
    }
}
