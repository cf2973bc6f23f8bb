//! Fixed-step integration of Model Exchange FMUs.

use fmi::fmi2::Fmi2Error;

/// The continuous part of a model as seen by a solver.
pub trait Model {
    fn get_continuous_states(&mut self, x: &mut [f64]) -> Result<(), Fmi2Error>;
    fn set_continuous_states(&mut self, x: &[f64]) -> Result<(), Fmi2Error>;
    fn get_derivatives(&mut self, dx: &mut [f64]) -> Result<(), Fmi2Error>;
    fn get_event_indicators(&mut self, z: &mut [f64]) -> Result<(), Fmi2Error>;
}

pub trait Solver<M> {
    /// * `nx` - The number of continuous states.
    /// * `nz` - The number of event indicators.
    fn new(start_time: f64, nx: usize, nz: usize) -> Self;

    /// Integrate up to `next_time`. Returns whether a state event occurred in the step.
    fn step(&mut self, model: &mut M, next_time: f64) -> Result<bool, Fmi2Error>;

    /// Re-read the event indicators after an event.
    fn reset(&mut self, model: &mut M) -> Result<(), Fmi2Error>;
}

/// Forward Euler with zero-crossing detection on the event indicators.
pub struct Euler {
    time: f64,
    x: Vec<f64>,
    dx: Vec<f64>,
    z: Vec<f64>,
    prez: Vec<f64>,
}

impl<M: Model> Solver<M> for Euler {
    fn new(start_time: f64, nx: usize, nz: usize) -> Self {
        Self {
            time: start_time,
            x: vec![0.0; nx],
            dx: vec![0.0; nx],
            z: vec![0.0; nz],
            prez: vec![0.0; nz],
        }
    }

    fn step(&mut self, model: &mut M, next_time: f64) -> Result<bool, Fmi2Error> {
        let dt = next_time - self.time;

        if !self.x.is_empty() {
            model.get_continuous_states(&mut self.x)?;
            model.get_derivatives(&mut self.dx)?;
            for (x, dx) in self.x.iter_mut().zip(&self.dx) {
                *x += dx * dt;
            }
            model.set_continuous_states(&self.x)?;
        }

        let mut state_event = false;
        if !self.z.is_empty() {
            model.get_event_indicators(&mut self.z)?;
            for (z, prez) in self.z.iter().zip(self.prez.iter_mut()) {
                // -\+ or +/-
                if (*prez <= 0.0 && *z > 0.0) || (*prez > 0.0 && *z <= 0.0) {
                    state_event = true;
                }
                *prez = *z;
            }
        }
        self.time = next_time;

        Ok(state_event)
    }

    fn reset(&mut self, model: &mut M) -> Result<(), Fmi2Error> {
        if !self.prez.is_empty() {
            model.get_event_indicators(&mut self.prez)?;
        }
        Ok(())
    }
}
