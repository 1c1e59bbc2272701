//! Common test utilities and helpers

#![allow(dead_code)]

use penpi::bridge::ProcessBridge;
use penpi::config::ShellConfig;
use penpi::notify::ValueChangedSink;
use penpi::transport::{Characteristic, CommandCharacteristic, TransportError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WINDOW: Duration = Duration::from_millis(50);
pub const POLL: Duration = Duration::from_millis(100);

/// Shell configuration for `/bin/sh`, optionally starting in `home`
pub fn sh_config(home: Option<PathBuf>) -> ShellConfig {
    ShellConfig {
        program: "/bin/sh".to_string(),
        home_dir: home,
        ..ShellConfig::default()
    }
}

/// Sink that only counts value-changed events
#[derive(Default)]
pub struct CountingSink {
    events: AtomicUsize,
}

impl CountingSink {
    pub fn events(&self) -> usize {
        self.events.load(Ordering::SeqCst)
    }
}

impl ValueChangedSink for CountingSink {
    fn value_changed(&self, _value: &[u8]) -> Result<(), TransportError> {
        self.events.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub async fn spawn_characteristic(
    home: Option<PathBuf>,
    sink: Arc<dyn ValueChangedSink>,
) -> CommandCharacteristic {
    let bridge = ProcessBridge::spawn(&sh_config(home), WINDOW)
        .await
        .expect("failed to start /bin/sh");
    CommandCharacteristic::new(Arc::new(bridge), sink, POLL)
}

/// Read until the accumulated output contains `needle`
pub async fn read_until<C: Characteristic + ?Sized>(characteristic: &C, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut output = Vec::new();
    while Instant::now() < deadline {
        output.extend(characteristic.read_value().await.expect("read failed"));
        if String::from_utf8_lossy(&output).contains(needle) {
            return String::from_utf8_lossy(&output).into_owned();
        }
    }
    panic!(
        "output never contained {:?}; got {:?}",
        needle,
        String::from_utf8_lossy(&output)
    );
}

/// Poll `condition` every few milliseconds for up to five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
