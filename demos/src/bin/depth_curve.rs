//! Demo 2: Cumulative Depth Curve
//!
//! Showcases: Point-in-time lookup, cumulative depth aggregation
//!
//! Run: cargo run --bin depth_curve -- <capture-folder> [event-time-ms]

use colored::*;
use depth_book::{DepthAggregator, DepthCurve, DepthPoint};
use depth_feed::{CaptureFolder, PipelineConfig};
use depth_types::Side;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

const LEVELS_TO_SHOW: usize = 15;
const BAR_WIDTH: usize = 50;

/// Bar length for a cumulative volume, clipped at `cap`
fn bar_len(cumulative: Decimal, cap: Decimal) -> usize {
    if cap.is_zero() {
        return 0;
    }
    let ratio = (cumulative / cap).min(Decimal::ONE);
    (ratio * Decimal::from(BAR_WIDTH))
        .round()
        .to_usize()
        .unwrap_or(0)
        .min(BAR_WIDTH)
}

fn draw_point(point: &DepthPoint, cap: Decimal, side: Side) {
    let len = bar_len(point.cumulative, cap);
    let bar = "█".repeat(len);
    let clipped = if point.cumulative > cap { "»" } else { " " };
    let bar = match side {
        Side::Bid => bar.green(),
        Side::Ask => bar.red(),
    };
    println!(
        "  {:>14} │{}{}{} {:>14}",
        point.price,
        bar,
        " ".repeat(BAR_WIDTH - len),
        clipped,
        point.cumulative
    );
}

fn draw_curve(curve: &DepthCurve, cap: Decimal) {
    let points: Vec<&DepthPoint> = curve.points.iter().take(LEVELS_TO_SHOW).collect();
    match curve.side {
        // asks drawn top-down from the furthest shown level
        Side::Ask => points.iter().rev().for_each(|p| draw_point(p, cap, Side::Ask)),
        Side::Bid => points.iter().for_each(|p| draw_point(p, cap, Side::Bid)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let folder = match args.next() {
        Some(folder) => folder,
        None => {
            eprintln!("usage: depth_curve <capture-folder> [event-time-ms]");
            std::process::exit(2);
        }
    };
    let query: Option<u64> = args.next().map(|t| t.parse()).transpose()?;

    let capture = CaptureFolder::new(&folder).load()?;
    let report = capture.replay(&PipelineConfig::new())?;
    let timeline = &report.timeline;

    let state = match query {
        Some(time) => timeline.closest(time),
        None => timeline.last(),
    };
    let Some(state) = state else {
        println!("{}", "No book states recorded".yellow());
        return Ok(());
    };

    let curves = DepthAggregator::curves(state.book());
    // bars clip at twice the thinner side
    let cap = curves.bids.total().min(curves.asks.total()) * Decimal::TWO;

    println!("{}", "═".repeat(70).cyan());
    println!("{}", "  CUMULATIVE DEPTH".cyan().bold());
    println!(
        "{}",
        format!("  {} @ {}", folder, state.event_time()).cyan()
    );
    println!("{}", "═".repeat(70).cyan());
    println!();
    println!(
        "  {:>14} {:^52} {:>14}",
        "PRICE".white().bold(),
        "CUMULATIVE VOLUME".white().bold(),
        "TOTAL".white().bold()
    );
    println!("  {}", "─".repeat(82));

    draw_curve(&curves.asks, cap);
    println!(
        "  {:>14} ├{}┤ {}",
        "",
        "─".repeat(BAR_WIDTH),
        format!(
            "SPREAD: {}",
            state.spread().map(|s| s.to_string()).unwrap_or_else(|| "-".into())
        )
        .yellow()
    );
    draw_curve(&curves.bids, cap);

    println!();
    println!(
        "  {} {}  {} {}  {} {}",
        "Bid depth:".green(),
        curves.bids.total(),
        "Ask depth:".red(),
        curves.asks.total(),
        "Scale cap:".white(),
        cap
    );
    Ok(())
}
