use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sweep_core::host::Notifier;
use sweep_core::messages::MessageCatalog;
use sweep_core::notice::Notice;
use tracing::debug;

/// Catalog shared by the broadcaster and the console so reloads reach both.
pub type SharedCatalog = Arc<RwLock<MessageCatalog>>;

/// Output line sink; stdout in the daemon, a buffer in tests.
pub type Sink = Arc<Mutex<dyn Write + Send>>;

pub fn stdout_sink() -> Sink {
    Arc::new(Mutex::new(std::io::stdout()))
}

pub fn write_line(sink: &Sink, line: &str) {
    let mut out = sink.lock().unwrap_or_else(PoisonError::into_inner);
    // Delivery is best effort; a closed stdout must not take the scheduler down.
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

/// Renders notices through the message catalog and writes them out.
pub struct Broadcaster {
    catalog: SharedCatalog,
    sink: Sink,
}

impl Broadcaster {
    pub fn new(catalog: SharedCatalog, sink: Sink) -> Self {
        Self { catalog, sink }
    }
}

impl Notifier for Broadcaster {
    fn notify(&self, notice: &Notice) {
        let line = self.catalog.read().unwrap_or_else(PoisonError::into_inner).render_notice(notice);
        debug!(key = notice.message_key(), "broadcast");
        write_line(&self.sink, &line);
    }
}
