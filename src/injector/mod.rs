//! Type-directed dependency injection.
//!
//! An [`Injector`] maps every output type to the builder producing it. Asking
//! for a type runs its builder after recursively building the builder's
//! parameters:
//!
//! ```ignore
//! let mut injector = Injector::new();
//! injector.add(|| Arc::new(MemoryStore::new()));
//! injector.add(|store: Arc<MemoryStore>| UserRepository::new(store));
//!
//! let repository: UserRepository = injector.get()?;
//! ```
//!
//! Nothing is cached: every request re-runs the whole builder chain. Builders
//! that must share state return a handle to it, typically an `Arc`.

mod builder;
mod populate;
mod resolver;

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::handler::Handler;

use crate::error::InjectorError;

pub use builder::{Builder, TypeInfo};
pub use populate::{Populate, Slot};
pub use resolver::Resolver;

type BuildFn =
    Arc<dyn Fn(&mut Resolver<'_>) -> Result<Box<dyn Any + Send>, InjectorError> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Registration {
    output: TypeInfo,
    dependencies: Vec<TypeInfo>,
    build: BuildFn,
}

/// Registry of builders keyed by the type they produce.
///
/// Register everything before resolving anything; resolution only needs
/// `&self` and is safe from many threads at once. Cloning is shallow and
/// gives an independent registry that shares the builders, which is how
/// scoped sub-containers are made.
#[derive(Clone, Default)]
pub struct Injector {
    builders: HashMap<TypeId, Registration>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder` for its output type, replacing any builder
    /// previously registered for that type.
    pub fn add<B, Args>(&mut self, builder: B) -> &mut Self
    where
        B: Builder<Args>,
        Args: 'static,
    {
        let output = TypeInfo::of::<B::Output>();
        let dependencies = builder.dependencies();
        let build: BuildFn = Arc::new(move |resolver: &mut Resolver<'_>| {
            builder
                .build(resolver)
                .map(|built| Box::new(built) as Box<dyn Any + Send>)
        });

        if self
            .builders
            .insert(
                output.id,
                Registration {
                    output,
                    dependencies,
                    build,
                },
            )
            .is_some()
        {
            tracing::debug!("Builder for type {} replaced", output.name);
        }
        self
    }

    /// Builds a `T`.
    pub fn get<T: 'static>(&self) -> Result<T, InjectorError> {
        self.resolver().resolve::<T>()
    }

    /// Calls `builder`, registered or not, with its parameters resolved.
    pub fn call_builder<B, Args>(&self, builder: &B) -> Result<B::Output, InjectorError>
    where
        B: Builder<Args>,
    {
        builder.build(&mut self.resolver())
    }

    /// Calls a builder whose output is a request handler.
    pub fn resolve_handler<B, Args, T>(&self, builder: &B) -> Result<B::Output, InjectorError>
    where
        B: Builder<Args>,
        B::Output: Handler<T, ()>,
        T: 'static,
    {
        self.call_builder(builder)
    }

    /// Runs `runner` immediately with its parameters resolved.
    pub fn run<B, Args>(&self, runner: B) -> Result<(), InjectorError>
    where
        B: Builder<Args, Output = ()>,
    {
        self.call_builder(&runner)
    }

    /// Overwrites every injectable field of `target`.
    pub fn populate_struct<P: Populate>(&self, target: &mut P) -> Result<(), InjectorError> {
        let slots = target.slots();
        if slots.is_empty() {
            return Err(InjectorError::PopulateTargetInvalid(std::any::type_name::<P>()));
        }

        let mut resolver = self.resolver();
        for slot in slots {
            tracing::trace!("Populating field of type {}", slot.target().name);
            slot.fill(&mut resolver)?;
        }
        Ok(())
    }

    /// Checks the whole graph without calling any builder: every dependency
    /// must be registered and no builder may depend on its own output.
    pub fn verify(&self) -> Result<(), InjectorError> {
        let mut roots: Vec<&Registration> = self.builders.values().collect();
        roots.sort_by_key(|registration| registration.output.name);

        let mut done = HashSet::new();
        let mut stack = Vec::new();
        for root in roots {
            self.visit(root.output, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        info: TypeInfo,
        stack: &mut Vec<TypeInfo>,
        done: &mut HashSet<TypeId>,
    ) -> Result<(), InjectorError> {
        if done.contains(&info.id) {
            return Ok(());
        }
        if stack.contains(&info) {
            return Err(InjectorError::DependencyCycle {
                path: resolver::cycle_path(stack, info),
            });
        }
        let registration = self
            .builders
            .get(&info.id)
            .ok_or(InjectorError::UnresolvedDependency(info.name))?;

        stack.push(info);
        for dependency in &registration.dependencies {
            self.visit(*dependency, stack, done)?;
        }
        stack.pop();
        done.insert(info.id);
        Ok(())
    }

    /// Logs every registered output type.
    pub fn show_available_builders(&self) {
        let mut names: Vec<&str> = self.builders.values().map(|r| r.output.name).collect();
        names.sort_unstable();
        for name in names {
            tracing::info!("Builder for type: {}", name);
        }
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.builders.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.builders)
    }
}
