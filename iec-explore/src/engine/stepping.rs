//! The stepping loops of both FMU types, over the communication grid of a [`SimRequest`].

use super::{
    solver::{Model, Solver},
    Recorder, SimRequest, ValueSource,
};
use crate::Error;

/// Outcome of one Co-Simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Completed,
    /// The slave refused the step but can go on
    Discarded,
    /// The slave stopped the simulation, its last successful time is given
    Terminated(f64),
}

/// A Co-Simulation slave as seen by the stepping loop.
pub trait Slave: ValueSource {
    fn do_step(&mut self, time: f64, h: f64) -> Result<StepOutcome, Error>;
}

/// Discrete-state update after an event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventUpdate {
    pub next_event_time: Option<f64>,
    pub terminate: bool,
}

/// A Model Exchange instance as seen by the stepping loop.
pub trait EventModel: Model + ValueSource {
    fn set_time(&mut self, time: f64) -> Result<(), Error>;

    /// Returns whether the model asks for event mode and whether it asks to terminate.
    fn completed_integrator_step(&mut self) -> Result<(bool, bool), Error>;

    fn enter_event_mode(&mut self) -> Result<(), Error>;

    /// Iterate the discrete states until they settle.
    fn update_discrete_states(&mut self) -> Result<EventUpdate, Error>;

    fn enter_continuous_time_mode(&mut self) -> Result<(), Error>;
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub end_time: f64,
    pub num_steps: usize,
    pub num_events: usize,
}

/// Step a Co-Simulation slave over the grid, recording before each step.
pub fn co_simulation<S: Slave>(
    slave: &mut S,
    request: &SimRequest,
    recorder: &mut Recorder,
) -> Result<Stats, Error> {
    request.validate()?;
    let h = request.output_interval();
    let mut stats = Stats::default();

    loop {
        let time = request.time_at(stats.num_steps);
        recorder.record(time, slave)?;
        stats.end_time = time;

        if stats.num_steps >= request.ncp {
            break;
        }

        match slave.do_step(time, h)? {
            StepOutcome::Completed => {}
            StepOutcome::Discarded => log::warn!("Step at t = {time} discarded"),
            StepOutcome::Terminated(last) => {
                log::warn!("Simulation terminated by the FMU at t = {last}");
                recorder.record(last, slave)?;
                stats.end_time = last;
                break;
            }
        }
        stats.num_steps += 1;
    }
    Ok(stats)
}

/// Integrate a Model Exchange instance with `solver`, stopping at time events and handling
/// state and step events. Outputs are recorded on the grid only.
///
/// The instance is expected in event mode, right after initialization.
pub fn model_exchange<M, S>(
    model: &mut M,
    solver: &mut S,
    request: &SimRequest,
    recorder: &mut Recorder,
) -> Result<Stats, Error>
where
    M: EventModel,
    S: Solver<M>,
{
    request.validate()?;
    let mut update = model.update_discrete_states()?;
    model.enter_continuous_time_mode()?;
    solver.reset(model)?;

    let mut stats = Stats {
        end_time: request.start_time,
        ..Default::default()
    };
    let mut time = request.start_time;
    let mut on_grid = true;

    loop {
        if on_grid {
            recorder.record(time, model)?;
            if stats.num_steps >= request.ncp {
                break;
            }
        }
        if update.terminate {
            log::warn!("Simulation terminated by the FMU at t = {time}");
            if !on_grid {
                recorder.record(time, model)?;
            }
            break;
        }

        let next_regular = request.time_at(stats.num_steps + 1);
        // Event times not ahead of the current time are stale
        let (next_time, time_event) = match update.next_event_time {
            Some(t) if t > time && t <= next_regular => (t, true),
            _ => (next_regular, false),
        };
        on_grid = !time_event || next_time >= next_regular;

        let state_event = solver.step(model, next_time)?;
        time = next_time;
        model.set_time(time)?;
        if on_grid {
            stats.num_steps += 1;
        }
        stats.end_time = time;

        let (step_event, terminate) = model.completed_integrator_step()?;
        update.terminate = terminate;

        if time_event || state_event || step_event {
            log::trace!(
                "Event at t = {time} [time: {time_event}, state: {state_event}, step: {step_event}]"
            );
            stats.num_events += 1;
            model.enter_event_mode()?;
            let next = model.update_discrete_states()?;
            update = EventUpdate {
                next_event_time: next.next_event_time,
                terminate: terminate || next.terminate,
            };
            model.enter_continuous_time_mode()?;
            solver.reset(model)?;
        }
    }
    Ok(stats)
}
