use std::{fmt, rc::Rc};

use faer::Mat;

use crate::{
    mesh::Point,
    space::{MixedSpace, SubSpace},
    Float, SimError,
};

/// Value prescribed by a [`DirichletBC`].
#[derive(Clone)]
pub enum BoundaryValue {
    Constant(Vec<Float>),
    /// Writes the value at a point into the output slice, one entry per component.
    Expression(Rc<dyn Fn(Point, &mut [Float])>),
}

impl BoundaryValue {
    pub fn expression(f: impl Fn(Point, &mut [Float]) + 'static) -> Self {
        BoundaryValue::Expression(Rc::new(f))
    }
}

impl From<[Float; 2]> for BoundaryValue {
    fn from(value: [Float; 2]) -> Self {
        BoundaryValue::Constant(value.to_vec())
    }
}

impl From<Float> for BoundaryValue {
    fn from(value: Float) -> Self {
        BoundaryValue::Constant(vec![value])
    }
}

impl fmt::Debug for BoundaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryValue::Constant(c) => f.debug_tuple("Constant").field(c).finish(),
            BoundaryValue::Expression(_) => f.write_str("Expression(<dyn Fn>)"),
        }
    }
}

/// Dirichlet constraint on one sub-space of the mixed space.
///
/// The marker receives a dof coordinate and whether the dof lies on a
/// boundary facet, and accepts the dofs to constrain. The constrained dofs and
/// their values are fixed when the condition is built.
#[derive(Debug, Clone)]
pub struct DirichletBC {
    name: String,
    sub: SubSpace,
    dofs: Vec<(usize, Float)>,
}

impl DirichletBC {
    pub fn new(
        name: impl AsRef<str>,
        space: &MixedSpace,
        sub: SubSpace,
        value: impl Into<BoundaryValue>,
        marker: impl Fn(Point, bool) -> bool,
    ) -> Result<Self, SimError> {
        let components = match sub {
            SubSpace::Velocity => 2,
            SubSpace::Pressure => 1,
        };
        let value = value.into();
        if let BoundaryValue::Constant(c) = &value {
            if c.len() != components {
                return Err(SimError::invalid(
                    "boundary value",
                    format!("expected {components} components, got {}", c.len()),
                ));
            }
        }

        let mut buffer = vec![0.0; components];
        let dofs = space
            .tabulate_dofs(sub)
            .into_iter()
            .filter(|&(_, x, on_boundary)| marker(x, on_boundary))
            .map(|(dof, x, _)| {
                let component = match sub {
                    SubSpace::Velocity => dof % 2,
                    SubSpace::Pressure => 0,
                };
                let v = match &value {
                    BoundaryValue::Constant(c) => c[component],
                    BoundaryValue::Expression(f) => {
                        f(x, &mut buffer);
                        buffer[component]
                    }
                };
                (dof, v)
            })
            .collect::<Vec<_>>();

        tracing::event!(
            tracing::Level::DEBUG,
            "boundary condition `{}` on sub-space {} constrains {} dofs",
            name.as_ref(),
            sub.index(),
            dofs.len()
        );

        Ok(Self {
            name: name.as_ref().to_string(),
            sub,
            dofs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sub_space(&self) -> SubSpace {
        self.sub
    }

    /// Constrained dofs with their prescribed values.
    pub fn dofs(&self) -> &[(usize, Float)] {
        &self.dofs
    }

    /// Writes the prescribed values into a coefficient vector.
    pub fn apply(&self, x: &mut Mat<Float>) {
        for &(dof, value) in &self.dofs {
            x[(dof, 0)] = value;
        }
    }
}

/// Prescribed values of a list of conditions, indexed by dof. Later conditions
/// override earlier ones on shared dofs.
pub(crate) fn constrained_values<'a>(
    dim: usize,
    bcs: impl IntoIterator<Item = &'a DirichletBC>,
) -> Vec<Option<Float>> {
    let mut values = vec![None; dim];
    for bc in bcs {
        for &(dof, value) in bc.dofs() {
            values[dof] = Some(value);
        }
    }
    values
}
