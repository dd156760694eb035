//! Demo 1: Capture Replay Viewer
//!
//! Showcases: Capture loading, async pipeline, timeline scrubbing,
//! level variations, trades around a state
//!
//! Run: cargo run --bin replay_session -- <capture-folder> [event-time-ms]

use colored::*;
use depth_book::{BookState, LevelVariation, MatchOutcome, SessionReport};
use depth_feed::{CaptureFolder, Pipeline, PipelineConfig};
use depth_types::{Side, TradeEvent};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

const LEVELS_TO_SHOW: usize = 10;

fn format_variation(variation: &LevelVariation) -> String {
    let line = format!("{:>14} | {:<14}", variation.price, variation.qty);
    if variation.change.is_zero() {
        line
    } else if variation.change > Decimal::ZERO {
        format!("{} {}", line, format!("(+{})", variation.change).green())
    } else {
        format!("{} {}", line, format!("({})", variation.change).red())
    }
}

/// Event time as a UTC wall-clock string
fn wall_clock(event_time: u64) -> String {
    i64::try_from(event_time)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| event_time.to_string())
}

fn draw_state(report: &SessionReport, state: &BookState, previous: &BookState) {
    println!(
        "  {} {}   {} {}   {} {}",
        "State @".white().bold(),
        wall_clock(state.event_time()),
        "Spread:".yellow(),
        state.spread().map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
        "Mid:".white(),
        state.mid_price().map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
    );
    println!();

    for side in Side::BOTH {
        let title = match side {
            Side::Bid => "BIDS".green().bold(),
            Side::Ask => "ASKS".red().bold(),
        };
        println!("  {}", title);
        for variation in state.variations(previous, side, LEVELS_TO_SHOW) {
            println!("    {}", format_variation(&variation));
        }
        println!();
    }

    let window = PipelineConfig::new().trade_window_ms;
    println!(
        "  {} (±{}ms)",
        "Trades around this state".white().bold(),
        window
    );
    for side in Side::BOTH {
        let trades = report.trades.in_window(side, state.event_time(), window);
        if trades.is_empty() {
            continue;
        }
        for trade in trades {
            println!("    {}", format_trade(side, trade));
        }
    }
}

fn format_trade(side: Side, trade: &TradeEvent) -> String {
    let line = format!("({}) {} | {}", trade.event_time, trade.price, trade.quantity);
    match side {
        Side::Bid => format!("{} {}", "BID".green(), line),
        Side::Ask => format!("{} {}", "ASK".red(), line),
    }
}

fn print_summary(report: &SessionReport) {
    let stats = report.stats;
    let matched = report
        .matches
        .iter()
        .filter(|m| matches!(m.outcome, MatchOutcome::Matched { .. }))
        .count();

    println!("  {} {}", "States recorded:".white(), report.timeline.len());
    println!(
        "  {} {} applied, {} stale, {} replayed, {} unrecorded",
        "Diffs:".white(),
        stats.book.applied,
        stats.book.stale,
        stats.book.replayed,
        stats.book.unrecorded
    );
    println!(
        "  {} {} ({} bid / {} ask), {} matched to book changes",
        "Trades:".white(),
        stats.trades,
        report.trades.trade_count(Side::Bid),
        report.trades.trade_count(Side::Ask),
        matched
    );
    if stats.malformed > 0 {
        println!("  {} {}", "Malformed records skipped:".yellow(), stats.malformed);
    }
    if let (Some(first), Some(last)) = (report.timeline.first(), report.timeline.last()) {
        println!(
            "  {} {} .. {} ({} ms)",
            "Event time:".white(),
            wall_clock(first.event_time()),
            wall_clock(last.event_time()),
            last.event_time() - first.event_time()
        );
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let folder = match args.next() {
        Some(folder) => folder,
        None => {
            eprintln!("usage: replay_session <capture-folder> [event-time-ms]");
            std::process::exit(2);
        }
    };
    let scrub_time: Option<u64> = args.next().map(|t| t.parse()).transpose()?;

    println!("{}", "═".repeat(70).cyan());
    println!("{}", "  CAPTURE REPLAY".cyan().bold());
    println!("{}", format!("  {}", folder).cyan());
    println!("{}", "═".repeat(70).cyan());
    println!();

    let capture = CaptureFolder::new(&folder).load()?;
    let pipeline = Pipeline::new(PipelineConfig::new())?;
    let sender = pipeline.sender();
    let handle = pipeline.spawn(capture.snapshot.clone());
    capture.feed(&sender).await?;

    let mut output = handle.await??;
    output.report.stats.malformed += capture.malformed;
    let report = output.report;

    println!("{} Replay finished ({:?})\n", "✓".green(), output.termination);
    print_summary(&report);

    let timeline = &report.timeline;
    let index = match scrub_time {
        Some(time) => timeline.index_at_or_after(time),
        None if timeline.is_empty() => None,
        None => Some(timeline.len() / 2),
    };

    match index.and_then(|i| timeline.get(i).map(|state| (i, state))) {
        Some((i, state)) => {
            let previous = timeline.previous_of(i).unwrap_or(state);
            draw_state(&report, state, previous);
        }
        None => println!("  {}", "No state at or after the requested time".yellow()),
    }

    Ok(())
}
