/// Constitutive laws for hyperelastic solids
///
/// This module provides:
/// - The `ConstitutiveModel` interface (stress, tangent, energy density)
/// - Corotated elasticity
/// - Small-strain linear elasticity

pub mod constitutive;

pub use constitutive::{cofactor, ConstitutiveModel, Corotated, LinearElasticity, MaterialModel};
