//! Gantt timeline reconstruction.
//!
//! [`reconstruct`] turns cached snapshots and the current time into
//! everything a renderer needs: the axis scale, tick positions and one row of
//! positioned intervals per process. Renderers only paint the result; all
//! time arithmetic happens here.

use crate::{ProcessId, ProcessSnapshot, ProcessState};

/// Narrowest time window the axis will show, in seconds.
pub const MIN_VISIBLE_SECS: f64 = 10.0;

/// Horizontal space handed to the reconstructor, in renderer units
/// (pixels, terminal columns, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLayout {
    pub width: f64,
    /// Reserved on the left for row labels; also the x of the axis origin.
    pub label_width: f64,
    pub right_margin: f64,
}

impl AxisLayout {
    pub fn available_width(&self) -> f64 {
        (self.width - self.label_width - self.right_margin).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalStyle {
    /// Full-height block.
    Solid,
    /// Thinner block with a larger vertical margin.
    Narrow,
    /// Dashed stroke along the row's center line, no fill.
    Dashed,
}

impl IntervalStyle {
    /// `None` means the state is deliberately not drawn.
    pub fn for_state(state: ProcessState) -> Option<Self> {
        match state {
            ProcessState::Running => Some(IntervalStyle::Solid),
            ProcessState::Blocked => Some(IntervalStyle::Narrow),
            ProcessState::Ready => Some(IntervalStyle::Dashed),
            ProcessState::New | ProcessState::Finished | ProcessState::Stopped => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Seconds since the axis start.
    pub offset: f64,
    pub x: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub state: ProcessState,
    pub start: f64,
    pub end: f64,
    pub x0: f64,
    pub x1: f64,
    pub style: IntervalStyle,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub process_id: ProcessId,
    pub intervals: Vec<Interval>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub pixels_per_second: f64,
    /// Seconds between ticks for this duration tier. When the tier would put
    /// more ticks than the width has units, only every n-th one is emitted.
    pub tick_spacing: f64,
    pub ticks: Vec<Tick>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Timeline {
    /// Nothing worth plotting yet; the renderer shows a placeholder.
    Empty,
    Plotted(Plot),
}

impl Timeline {
    pub fn has_data(&self) -> bool {
        matches!(self, Timeline::Plotted(_))
    }

    pub fn plot(&self) -> Option<&Plot> {
        match self {
            Timeline::Plotted(plot) => Some(plot),
            Timeline::Empty => None,
        }
    }
}

pub fn tick_spacing(duration: f64) -> f64 {
    if duration <= 30.0 {
        2.0
    } else if duration <= 120.0 {
        10.0
    } else {
        30.0
    }
}

/// Builds the timeline for `snapshots` as of `now` (seconds, same clock as
/// the history timestamps). `now` only matters while some process is still
/// live; once every process is terminal the axis ends at the last recorded
/// transition.
pub fn reconstruct(snapshots: &[&ProcessSnapshot], now: f64, layout: AxisLayout) -> Timeline {
    if !snapshots.iter().any(|snapshot| snapshot.history.len() > 1) {
        return Timeline::Empty;
    }

    let firsts = snapshots
        .iter()
        .filter_map(|snapshot| snapshot.first_transition());
    let Some(start) = firsts.map(|transition| transition.at).reduce(f64::min) else {
        return Timeline::Empty;
    };

    let end = if snapshots.iter().all(|snapshot| snapshot.is_terminal()) {
        snapshots
            .iter()
            .filter_map(|snapshot| snapshot.last_transition())
            .map(|transition| transition.at)
            .fold(start, f64::max)
    } else {
        now
    };

    let duration = (end - start).max(MIN_VISIBLE_SECS);
    let pixels_per_second = layout.available_width() / duration;
    let origin = layout.label_width;
    let x_at = |at: f64| origin + (at - start) * pixels_per_second;

    let spacing = tick_spacing(duration);
    let tick_count = (duration / spacing).floor() as usize;
    // At most one tick per unit of width; denser tiers keep every n-th tick.
    let max_ticks = (layout.available_width().floor() as usize).max(1);
    let stride = tick_count.div_ceil(max_ticks).max(1);
    let ticks = (0..=tick_count)
        .step_by(stride)
        .map(|index| {
            let offset = index as f64 * spacing;
            Tick {
                offset,
                x: origin + offset * pixels_per_second,
            }
        })
        .collect();

    let rows = snapshots
        .iter()
        .map(|snapshot| Row {
            process_id: snapshot.id,
            intervals: synthesize_intervals(snapshot, end, &x_at),
        })
        .collect();

    Timeline::Plotted(Plot {
        start,
        end,
        duration,
        pixels_per_second,
        tick_spacing: spacing,
        ticks,
        rows,
    })
}

fn synthesize_intervals(
    snapshot: &ProcessSnapshot,
    end: f64,
    x_at: &impl Fn(f64) -> f64,
) -> Vec<Interval> {
    let history = &snapshot.history;
    history
        .iter()
        .enumerate()
        .filter_map(|(index, transition)| {
            let style = IntervalStyle::for_state(transition.state)?;
            // The open interval follows the axis end; a lagging clock
            // collapses it to zero width instead of reversing it.
            let close = match history.get(index + 1) {
                Some(next) => next.at,
                None => end.max(transition.at),
            };
            Some(Interval {
                state: transition.state,
                start: transition.at,
                end: close,
                x0: x_at(transition.at),
                x1: x_at(close),
                style,
            })
        })
        .collect()
}
