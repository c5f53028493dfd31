use std::any::TypeId;
use std::collections::HashMap;

use crate::error::InjectorError;
use crate::injector::Registration;
use crate::injector::builder::TypeInfo;

/// One depth-first resolution over the registered builders.
///
/// Carries the chain of types currently being built, so that a builder which
/// needs its own output, directly or not, fails instead of recursing forever.
pub struct Resolver<'a> {
    builders: &'a HashMap<TypeId, Registration>,
    resolving: Vec<TypeInfo>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(builders: &'a HashMap<TypeId, Registration>) -> Self {
        Self {
            builders,
            resolving: Vec::new(),
        }
    }

    /// Builds a fresh `T`, building its dependencies first.
    pub fn resolve<T: 'static>(&mut self) -> Result<T, InjectorError> {
        let wanted = TypeInfo::of::<T>();
        let builders = self.builders;
        let registration = builders
            .get(&wanted.id)
            .ok_or(InjectorError::UnresolvedDependency(wanted.name))?;

        if self.resolving.contains(&wanted) {
            return Err(InjectorError::DependencyCycle {
                path: cycle_path(&self.resolving, wanted),
            });
        }

        self.resolving.push(wanted);
        let built = (registration.build)(self);
        self.resolving.pop();

        built?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| InjectorError::TypeMismatch(wanted.name))
    }

    /// Types currently under construction, outermost first.
    pub fn resolving(&self) -> &[TypeInfo] {
        &self.resolving
    }
}

/// Renders `A -> B -> A` starting at the first occurrence of `closing`.
pub(crate) fn cycle_path(stack: &[TypeInfo], closing: TypeInfo) -> String {
    let start = stack.iter().position(|info| *info == closing).unwrap_or(0);
    stack[start..]
        .iter()
        .chain(std::iter::once(&closing))
        .map(|info| info.name)
        .collect::<Vec<_>>()
        .join(" -> ")
}
