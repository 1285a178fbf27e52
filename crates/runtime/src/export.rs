use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use core_sim::{Direction, Trade};
use serde::Serialize;
use thiserror::Error;

use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};

pub const TRADE_CSV_HEADER: &str = "direction,quantity,tick_opened,tick_closed,entry_price,exit_price,value_when_bought,value_when_sold,pnl\n";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode trade row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write trade export: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Serialize)]
struct TradeRow {
    direction: &'static str,
    quantity: u64,
    tick_opened: u64,
    tick_closed: u64,
    entry_price: f64,
    exit_price: f64,
    value_when_bought: f64,
    value_when_sold: f64,
    pnl: f64,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        let (value_when_bought, value_when_sold) = match trade.direction {
            Direction::Long => (trade.entry_price, trade.exit_price),
            Direction::Short => (trade.exit_price, trade.entry_price),
        };

        Self {
            direction: trade.direction.as_str(),
            quantity: trade.quantity_closed,
            tick_opened: trade.tick_opened,
            tick_closed: trade.tick_closed,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            value_when_bought,
            value_when_sold,
            pnl: trade.pnl(),
        }
    }
}

/// One CSV row per closed trade; the header is written with the first row.
pub struct TradeCsvWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TradeCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn write_trades<'a>(
        &mut self,
        trades: impl IntoIterator<Item = &'a Trade>,
    ) -> Result<usize, ExportError> {
        let mut written = 0;
        for trade in trades {
            self.writer.serialize(TradeRow::from(trade))?;
            written += 1;
        }
        Ok(written)
    }

    pub fn write_trades_and_log<'a>(
        &mut self,
        trades: impl IntoIterator<Item = &'a Trade>,
        tick: u64,
        run_log_writer: &mut dyn RunLogWriter,
    ) -> Result<usize, ExportError> {
        let written = self.write_trades(trades)?;
        self.writer.flush()?;
        run_log_writer.write(RunLogEvent::new(
            tick,
            RunLogEventKind::TradesExported,
            format!("rows={written}"),
        ));
        Ok(written)
    }

    pub fn into_inner(self) -> Result<W, ExportError> {
        self.writer
            .into_inner()
            .map_err(|err| ExportError::Io(err.into_error()))
    }
}

/// Writes `trades` to `path`, creating parent directories. Nothing is
/// written when there are no trades; returns the number of rows otherwise.
pub fn export_trades_to_path(
    path: &Path,
    trades: &[Trade],
    tick: u64,
    run_log_writer: &mut dyn RunLogWriter,
) -> Result<Option<usize>, ExportError> {
    if trades.is_empty() {
        return Ok(None);
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = TradeCsvWriter::new(File::create(path)?);
    let written = writer.write_trades_and_log(trades, tick, run_log_writer)?;
    Ok(Some(written))
}

pub fn trades_to_csv_string(trades: &[Trade]) -> Result<String, ExportError> {
    let mut writer = TradeCsvWriter::new(Vec::new());
    writer.write_trades(trades)?;
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes)
        .map_err(|err| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}
