//! Driving one pipeline across a range of timesteps.
//!
//! ```text
//! Idle -> [Executing(t) -> Recorded(t) | Skipped(t)]* -> Finalizing -> Idle
//! ```
//!
//! A recoverable error at timestep `t` skips `t` and the loop carries on; a
//! fatal error aborts the whole loop. Recorded outputs are combined once at
//! the end by the [`TimeLoopCollector`], which drops them straight after.

pub mod collector;

pub use collector::CollectAllTimesteps;

use crate::config::TimeLoopSettings;
use crate::data::DataObject;
use crate::error::{FlowError, FlowResult};
use crate::pipeline::{Contract, EngineContext, NodeId, Pipeline};
use std::fmt;

/// Inclusive timestep range with a stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLoopRange {
    pub start: usize,
    /// `None` runs to the last available timestep.
    pub end: Option<usize>,
    pub stride: usize,
}

impl TimeLoopRange {
    pub fn new(start: usize, end: usize, stride: usize) -> Self {
        Self {
            start,
            end: Some(end),
            stride,
        }
    }

    /// From `start` to the end of the database.
    pub fn open(start: usize, stride: usize) -> Self {
        Self {
            start,
            end: None,
            stride,
        }
    }

    pub fn from_settings(settings: &TimeLoopSettings) -> Self {
        Self {
            start: settings.start,
            end: settings.end,
            stride: settings.stride,
        }
    }

    /// The timesteps to visit, given how many the database holds.
    ///
    /// An end past the last timestep is clamped with a warning.
    pub fn resolve(&self, available: Option<usize>, ctx: &EngineContext) -> FlowResult<Vec<usize>> {
        if self.stride == 0 {
            return Err(FlowError::Config("time loop stride must be positive".to_string()));
        }
        let mut end = match (self.end, available) {
            (Some(end), _) => end,
            (None, Some(n)) if n > 0 => n - 1,
            (None, Some(_)) => {
                return Err(FlowError::Config("database has no timesteps".to_string()));
            }
            (None, None) => {
                return Err(FlowError::Config(
                    "open-ended time loop needs the number of timesteps".to_string(),
                ));
            }
        };
        if let Some(n) = available {
            if n == 0 {
                return Err(FlowError::Config("database has no timesteps".to_string()));
            }
            if end >= n {
                ctx.warn(format!(
                    "Time loop end {} is past the last timestep {}; clamping",
                    end,
                    n - 1
                ));
                end = n - 1;
            }
        }
        if self.start > end {
            return Err(FlowError::Config(format!(
                "time loop start {} is after end {}",
                self.start, end
            )));
        }
        Ok((self.start..=end).step_by(self.stride).collect())
    }
}

impl Default for TimeLoopRange {
    fn default() -> Self {
        Self::from_settings(&TimeLoopSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeLoopState {
    #[default]
    Idle,
    Executing(usize),
    Recorded(usize),
    Skipped(usize),
    Finalizing,
}

impl fmt::Display for TimeLoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLoopState::Idle => write!(f, "idle"),
            TimeLoopState::Executing(t) => write!(f, "executing t={}", t),
            TimeLoopState::Recorded(t) => write!(f, "recorded t={}", t),
            TimeLoopState::Skipped(t) => write!(f, "skipped t={}", t),
            TimeLoopState::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// Per-timestep accumulator and final combiner.
pub trait TimeLoopCollector: Send {
    /// Judge a timestep that executed without error. Returning `false`
    /// skips it like a data error would.
    fn execution_successful(&self, _timestep: usize, _output: &DataObject) -> bool {
        true
    }

    /// Keep what is needed from a successful timestep.
    fn record(&mut self, timestep: usize, output: &DataObject) -> FlowResult<()>;

    /// Combine everything recorded into the loop's final output.
    fn execute_all_timesteps(&mut self, valid_times: &[usize]) -> FlowResult<DataObject>;

    /// Drop everything recorded.
    fn release_data(&mut self);
}

pub struct TimeLoopFilter<C: TimeLoopCollector> {
    range: TimeLoopRange,
    available_timesteps: Option<usize>,
    collector: C,
    state: TimeLoopState,
    valid_times: Vec<usize>,
    skipped_times: Vec<usize>,
    errors: Vec<String>,
    output: Option<DataObject>,
}

impl<C: TimeLoopCollector> TimeLoopFilter<C> {
    pub fn new(range: TimeLoopRange, collector: C) -> Self {
        Self {
            range,
            available_timesteps: None,
            collector,
            state: TimeLoopState::Idle,
            valid_times: Vec::new(),
            skipped_times: Vec::new(),
            errors: Vec::new(),
            output: None,
        }
    }

    /// Timesteps the source holds; used to clamp and to close an open range.
    pub fn with_available_timesteps(mut self, n: usize) -> Self {
        self.available_timesteps = Some(n);
        self
    }

    pub fn range(&self) -> &TimeLoopRange {
        &self.range
    }

    pub fn state(&self) -> TimeLoopState {
        self.state
    }

    pub fn valid_times(&self) -> &[usize] {
        &self.valid_times
    }

    pub fn skipped_times(&self) -> &[usize] {
        &self.skipped_times
    }

    /// One line per skipped timestep, or `None` when nothing was skipped.
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("\n"))
        }
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn output(&self) -> Option<&DataObject> {
        self.output.as_ref()
    }

    /// Execute `node` once per timestep in range and combine the results.
    pub fn run(&mut self, pipeline: &mut Pipeline, node: NodeId, contract: &Contract) -> FlowResult<&DataObject> {
        let ctx = pipeline.engine().clone();
        let times = self.range.resolve(self.available_timesteps, &ctx)?;

        self.valid_times.clear();
        self.skipped_times.clear();
        self.errors.clear();
        self.output = None;
        self.collector.release_data();

        tracing::info!("Time loop over {} timesteps", times.len());
        for t in times {
            self.state = TimeLoopState::Executing(t);
            let collector = &mut self.collector;
            let result = pipeline.update(node, &contract.with_timestep(t)).and_then(|out| {
                if collector.execution_successful(t, out) {
                    collector.record(t, out)
                } else {
                    Err(FlowError::Data(format!("timestep {} reported failure", t)))
                }
            });

            match result {
                Ok(()) => {
                    self.valid_times.push(t);
                    self.state = TimeLoopState::Recorded(t);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping timestep {}: {}", t, e);
                    self.skipped_times.push(t);
                    self.errors.push(format!("timestep {}: {}", t, e));
                    self.state = TimeLoopState::Skipped(t);
                }
                Err(e) => {
                    self.collector.release_data();
                    self.state = TimeLoopState::Idle;
                    return Err(e.with_context(format!("time loop aborted at timestep {}", t)));
                }
            }
        }

        self.state = TimeLoopState::Finalizing;
        ctx.time_loop_finished(self.valid_times.len(), self.skipped_times.len());

        if self.valid_times.is_empty() {
            self.collector.release_data();
            self.state = TimeLoopState::Idle;
            return Err(FlowError::AllTimestepsSkipped {
                count: self.skipped_times.len(),
                messages: self.errors.join("; "),
            });
        }
        if let Some(message) = self.error_message() {
            ctx.warn(format!(
                "{} of {} timesteps skipped:\n{}",
                self.skipped_times.len(),
                self.skipped_times.len() + self.valid_times.len(),
                message
            ));
        }

        let combined = self.collector.execute_all_timesteps(&self.valid_times);
        self.collector.release_data();
        self.state = TimeLoopState::Idle;
        Ok(&*self.output.insert(combined?))
    }

    /// Drop the combined output and anything the collector still holds.
    pub fn release_data(&mut self) {
        self.output = None;
        self.collector.release_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticDatabase;
    use crate::pipeline::{DatabaseSource, EngineMessage};
    use crate::sil::SilRestriction;

    fn pipeline(db: SyntheticDatabase) -> (Pipeline, NodeId, usize) {
        let mut p = Pipeline::new(EngineContext::default());
        let source = DatabaseSource::new(db);
        let steps = source.number_of_timesteps();
        let src = p.add_source(source);
        (p, src, steps)
    }

    fn contract() -> Contract {
        Contract::new(SilRestriction::all_domains("mesh", 2), "pressure")
    }

    #[test]
    fn test_range_resolution() {
        let ctx = EngineContext::default();
        assert_eq!(TimeLoopRange::new(1, 7, 3).resolve(Some(10), &ctx).unwrap(), vec![1, 4, 7]);
        assert_eq!(TimeLoopRange::open(0, 2).resolve(Some(5), &ctx).unwrap(), vec![0, 2, 4]);
        assert!(TimeLoopRange::new(0, 3, 0).resolve(Some(5), &ctx).unwrap_err().is_fatal());
        assert!(TimeLoopRange::new(4, 2, 1).resolve(None, &ctx).is_err());
        assert!(TimeLoopRange::open(0, 1).resolve(None, &ctx).is_err());
    }

    #[test]
    fn test_end_is_clamped_with_warning() {
        let (ctx, bridge) = EngineContext::new(Default::default());
        let times = TimeLoopRange::new(0, 99, 1).resolve(Some(3), &ctx).unwrap();
        assert_eq!(times, vec![0, 1, 2]);
        assert_eq!(bridge.drain_warnings().len(), 1);
    }

    #[test]
    fn test_failed_timesteps_are_skipped() {
        let db = SyntheticDatabase::new_2d(2, 1, 2, 5).failing_at(1).failing_at(3);
        let (mut p, src, steps) = pipeline(db);
        let mut tl = TimeLoopFilter::new(TimeLoopRange::open(0, 1), CollectAllTimesteps::new())
            .with_available_timesteps(steps);

        let out = tl.run(&mut p, src, &contract()).unwrap();
        let tree = out.tree("test").unwrap();
        assert_eq!(tree.number_of_leaves(), 6);
        assert_eq!(tl.valid_times(), &[0, 2, 4]);
        assert_eq!(tl.skipped_times(), &[1, 3]);
        assert!(tl.error_message().unwrap().contains("timestep 3"));
        assert_eq!(tl.state(), TimeLoopState::Idle);
        assert_eq!(tl.collector().recorded(), 0);
    }

    #[test]
    fn test_all_skipped_is_an_error() {
        let db = SyntheticDatabase::new_2d(2, 1, 2, 2).failing_at(0).failing_at(1);
        let (mut p, src, steps) = pipeline(db);
        let mut tl = TimeLoopFilter::new(TimeLoopRange::open(0, 1), CollectAllTimesteps::new())
            .with_available_timesteps(steps);
        let err = tl.run(&mut p, src, &contract()).unwrap_err();
        assert!(matches!(err, FlowError::AllTimestepsSkipped { count: 2, .. }));
    }

    #[test]
    fn test_fatal_error_aborts() {
        let (mut p, src, steps) = pipeline(SyntheticDatabase::new_2d(2, 1, 2, 3));
        let mut tl = TimeLoopFilter::new(TimeLoopRange::open(0, 1), CollectAllTimesteps::new())
            .with_available_timesteps(steps);
        // Unknown mesh name is a wiring mistake, not bad data.
        let bad = Contract::new(SilRestriction::all_domains("other", 2), "pressure");
        let err = tl.run(&mut p, src, &bad).unwrap_err();
        assert!(err.is_fatal());
        assert!(tl.valid_times().is_empty());
        assert!(tl.skipped_times().is_empty());
    }

    #[test]
    fn test_finished_message() {
        let (ctx, bridge) = EngineContext::new(Default::default());
        let mut p = Pipeline::new(ctx);
        let src = p.add_source(DatabaseSource::new(SyntheticDatabase::new_2d(1, 1, 1, 4).failing_at(2)));
        let mut tl = TimeLoopFilter::new(TimeLoopRange::new(0, 3, 1), CollectAllTimesteps::new());
        tl.run(&mut p, src, &Contract::new(SilRestriction::all_domains("mesh", 1), "pressure"))
            .unwrap();
        let msgs = bridge.drain();
        assert!(msgs.contains(&EngineMessage::TimeLoopFinished { valid: 3, skipped: 1 }));
    }
}
