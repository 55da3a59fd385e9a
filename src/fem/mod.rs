pub mod discretization;
pub mod dof;
pub mod mass;
pub mod kinematics;
pub mod assembly;
pub mod system;
pub mod time_integration;

pub use discretization::Discretization;
pub use dof::DofManager;
pub use mass::{nodal_masses, LumpedMass};
pub use kinematics::{update_kinematics, SimulationState};
pub use assembly::Assembler;
pub use system::ElasticSystem;
pub use time_integration::{ImplicitStepper, NewtonIteration, StepPhase, TimeStepStats};
