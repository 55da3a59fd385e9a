pub mod error;
pub mod config;
pub mod mesh;
pub mod mesh_generator;
pub mod fem;
pub mod linalg;
pub mod mechanics;
pub mod simulation;

pub use error::{ElasticError, ElasticResult};
pub use config::{SimulationConfig, PhysicsConfig, TimeSteppingConfig, SolverConfig, OutputConfig, ModelKind};
pub use mesh::{SimplexElement, SimplexMesh, Grid, FrameExporter, ObjExporter, MemoryExporter, NullExporter};
pub use mesh_generator::MeshGenerator;
pub use fem::{Discretization, DofManager, LumpedMass, nodal_masses, SimulationState, update_kinematics, Assembler, ElasticSystem, ImplicitStepper, NewtonIteration, StepPhase, TimeStepStats};
pub use linalg::{Solver, SolverStats, LinearOperator, dot, norm, axpy, residual_norm, ConjugateGradient, Preconditioner, JacobiPreconditioner, IdentityPreconditioner, polar_decomposition, PolarDecomposition};
pub use mechanics::{ConstitutiveModel, Corotated, LinearElasticity, MaterialModel, cofactor};
pub use simulation::Simulation;
