/// Implicit time integration for elastodynamics
///
/// Advances free nodal positions with the two-step scheme of
/// [`ElasticSystem`]: each step solves g(φ) = 0 with a bounded Newton loop,
/// a preconditioned Krylov solve per iteration and a backtracking line
/// search on ‖g‖.

use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::error::{ElasticError, ElasticResult};
use crate::fem::{update_kinematics, ElasticSystem, SimulationState};
use crate::linalg::{norm, Solver};
use crate::mechanics::ConstitutiveModel;

/// Where the stepper is in its per-step state machine
///
/// `step` always leaves the stepper `Idle`; the outcome of the last step is
/// kept in [`ImplicitStepper::last_outcome`] and `TimeStepStats::phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Between steps
    Idle,
    /// Initial guess φ = φₙ being set up
    Predicting,
    NewtonIterating,
    Converged,
    Diverged,
}

/// One Newton update
#[derive(Debug, Clone)]
pub struct NewtonIteration {
    /// ‖g‖ after the update
    pub residual: f64,
    /// Inner solver iterations
    pub linear_iterations: usize,
    /// Inner solver relative residual
    pub linear_residual: f64,
    pub linear_converged: bool,
    /// Accepted step length α
    pub step_length: f64,
    /// BE(φ) after the update
    pub energy: f64,
}

/// Time integration statistics for a single step
#[derive(Debug, Clone)]
pub struct TimeStepStats {
    /// Index of the step just taken (1-based)
    pub step: usize,
    /// Simulation time after the step
    pub time: f64,
    /// Time step size used
    pub dt: f64,
    /// Number of Newton updates
    pub newton_iterations: usize,
    /// Final residual norm ‖g‖
    pub residual: f64,
    /// Inner solver iterations summed over the step
    pub linear_iterations: usize,
    /// BE(φ) at the accepted state
    pub energy: f64,
    pub phase: StepPhase,
    pub history: Vec<NewtonIteration>,
}

/// Newton driver holding the position history φₙ₋₁, φₙ
///
/// **Algorithm** (per step, from φ = φₙ):
/// 1. Scatter φ, update kinematics, evaluate g
/// 2. Stop if ‖g‖ ≤ tol_newton; fail if the iteration cap is hit or ‖g‖ is
///    not finite
/// 3. Solve Dg Δφ = −g to relative tolerance tol_cg
/// 4. Try φ + αΔφ for α = 1, ρ, ρ², … and take the first that lowers ‖g‖.
///    Without one, a converged inner solve takes the full step and a
///    stalled one fails the step
///
/// A failed step leaves φₙ and the deformed positions as they were.
///
/// φₙ₋₁ is stored for the step size of the last step. When `dt` changes it
/// is moved along φₙ − φₙ₋₁ so the difference keeps representing velocity
/// times the new `dt`.
pub struct ImplicitStepper<S: Solver> {
    phi: Vec<f64>,
    phi_prev: Vec<f64>,
    /// Step size φₙ₋₁ was recorded with; `None` while at rest
    history_dt: Option<f64>,
    time: f64,
    steps: usize,
    phase: StepPhase,
    last_outcome: Option<StepPhase>,
    config: SolverConfig,
    solver: S,
}

impl<S: Solver> ImplicitStepper<S> {
    /// Start at rest: φₙ = φₙ₋₁ = `phi0`
    pub fn new(phi0: Vec<f64>, config: SolverConfig, mut solver: S) -> Self {
        solver.set_tolerance(config.tol_cg);
        solver.set_max_iterations(config.max_cg_iterations);
        Self {
            phi_prev: phi0.clone(),
            phi: phi0,
            history_dt: None,
            time: 0.0,
            steps: 0,
            phase: StepPhase::Idle,
            last_outcome: None,
            config,
            solver,
        }
    }

    /// Current positions φₙ
    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    /// Previous positions φₙ₋₁
    pub fn phi_prev(&self) -> &[f64] {
        &self.phi_prev
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Accepted steps so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// `Converged` or `Diverged` for the last attempted step
    pub fn last_outcome(&self) -> Option<StepPhase> {
        self.last_outcome
    }

    /// Rescale φₙ₋₁ to step size `dt`: φₙ₋₁ ← φₙ − (dt / dt_old)(φₙ − φₙ₋₁)
    pub fn rescale_history(&mut self, dt: f64) {
        if let Some(old) = self.history_dt {
            if old != dt {
                let ratio = dt / old;
                for (prev, &cur) in self.phi_prev.iter_mut().zip(&self.phi) {
                    *prev = cur - ratio * (cur - *prev);
                }
                debug!("history rescaled from dt = {} to dt = {}", old, dt);
            }
        }
        self.history_dt = Some(dt);
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Advance one timestep
    ///
    /// On success `state` holds φₙ₊₁ with current kinematics.
    ///
    /// # Errors
    /// - `NewtonDivergence` when the iteration cap is reached or the
    ///   residual becomes non-finite
    /// - `LinearSolveStall` when a stalled inner solve yields no step that
    ///   lowers the residual
    pub fn step<M: ConstitutiveModel + ?Sized>(
        &mut self,
        system: &ElasticSystem<'_, M>,
        state: &mut SimulationState,
    ) -> ElasticResult<TimeStepStats> {
        self.rescale_history(system.dt);
        self.phase = StepPhase::Predicting;
        let mut phi = self.phi.clone();
        let mut g = self.evaluate(system, state, &phi);
        let mut g_norm = norm(&g);

        self.phase = StepPhase::NewtonIterating;
        let mut history: Vec<NewtonIteration> = Vec::new();
        let mut linear_iterations = 0;

        while g_norm > self.config.tol_newton {
            let k = history.len();
            if k >= self.config.max_newton_iterations || !g_norm.is_finite() {
                self.restore(system, state);
                return Err(ElasticError::NewtonDivergence {
                    iterations: k,
                    residual: g_norm,
                });
            }

            let jacobian = system.jacobian(state);
            let rhs: Vec<f64> = g.iter().map(|x| -x).collect();
            let (dphi, stats) = self.solver.solve(&jacobian, &rhs);
            linear_iterations += stats.iterations;
            if !stats.converged {
                warn!(
                    "{} stalled after {} iterations (relative residual {:.3e})",
                    self.solver.name(),
                    stats.iterations,
                    stats.relative_residual
                );
            }

            let (trial, trial_g, trial_norm, alpha) = match self.line_search(system, state, &phi, &dphi, g_norm) {
                Some(found) => found,
                None if stats.converged => {
                    warn!("line search found no decrease, taking the full Newton step");
                    let full = Self::advance(&phi, &dphi, 1.0);
                    let full_g = self.evaluate(system, state, &full);
                    let full_norm = norm(&full_g);
                    (full, full_g, full_norm, 1.0)
                }
                None => {
                    self.restore(system, state);
                    return Err(ElasticError::LinearSolveStall {
                        iterations: stats.iterations,
                        residual: stats.relative_residual,
                    });
                }
            };

            phi = trial;
            g = trial_g;
            g_norm = trial_norm;

            let energy = system.backward_euler_energy(state, &phi, &self.phi, &self.phi_prev);
            debug!(
                "newton {}: |g| = {:.3e}, cg {} its ({:.2e}), alpha = {}, BE = {:.6e}",
                k + 1,
                g_norm,
                stats.iterations,
                stats.relative_residual,
                alpha,
                energy
            );
            history.push(NewtonIteration {
                residual: g_norm,
                linear_iterations: stats.iterations,
                linear_residual: stats.relative_residual,
                linear_converged: stats.converged,
                step_length: alpha,
                energy,
            });
        }

        let energy = system.backward_euler_energy(state, &phi, &self.phi, &self.phi_prev);
        self.phi_prev = std::mem::replace(&mut self.phi, phi);
        self.time += system.dt;
        self.steps += 1;
        self.phase = StepPhase::Idle;
        self.last_outcome = Some(StepPhase::Converged);

        Ok(TimeStepStats {
            step: self.steps,
            time: self.time,
            dt: system.dt,
            newton_iterations: history.len(),
            residual: g_norm,
            linear_iterations,
            energy,
            phase: StepPhase::Converged,
            history,
        })
    }

    /// Backtrack from α = 1; returns (φ, g, ‖g‖, α) of the first decrease
    fn line_search<M: ConstitutiveModel + ?Sized>(
        &self,
        system: &ElasticSystem<'_, M>,
        state: &mut SimulationState,
        phi: &[f64],
        dphi: &[f64],
        g_norm: f64,
    ) -> Option<(Vec<f64>, Vec<f64>, f64, f64)> {
        let mut alpha = 1.0;
        for _ in 0..=self.config.max_line_search {
            let trial = Self::advance(phi, dphi, alpha);
            let trial_g = self.evaluate(system, state, &trial);
            let trial_norm = norm(&trial_g);
            if trial_norm < g_norm {
                return Some((trial, trial_g, trial_norm, alpha));
            }
            alpha *= self.config.line_search_rho;
        }
        None
    }

    /// Scatter φ into the state, refresh kinematics, return g(φ)
    fn evaluate<M: ConstitutiveModel + ?Sized>(
        &self,
        system: &ElasticSystem<'_, M>,
        state: &mut SimulationState,
        phi: &[f64],
    ) -> Vec<f64> {
        system.dofs.scatter(phi, &mut state.deformed);
        update_kinematics(system.mesh, system.disc, state);
        system.residual(state, phi, &self.phi, &self.phi_prev)
    }

    /// Put the state back at φₙ after a failed step
    fn restore<M: ConstitutiveModel + ?Sized>(&mut self, system: &ElasticSystem<'_, M>, state: &mut SimulationState) {
        system.dofs.scatter(&self.phi, &mut state.deformed);
        update_kinematics(system.mesh, system.disc, state);
        self.phase = StepPhase::Idle;
        self.last_outcome = Some(StepPhase::Diverged);
    }

    fn advance(phi: &[f64], dphi: &[f64], alpha: f64) -> Vec<f64> {
        phi.iter().zip(dphi).map(|(&x, &dx)| x + alpha * dx).collect()
    }
}
