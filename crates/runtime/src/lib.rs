pub mod export;
pub mod logging;
pub mod session;

pub use export::{export_trades_to_path, trades_to_csv_string, ExportError, TradeCsvWriter};
pub use logging::{
    InMemoryRunLogWriter, RunLogEvent, RunLogEventKind, RunLogWriter, SharedRunLogWriter,
    TracingRunLogWriter,
};
pub use session::{
    spawn_session, Session, SessionError, SessionEvent, SessionHandle, SessionOptions,
    SessionSummary,
};
