use std::any::{TypeId, type_name};
use std::fmt;

use crate::error::InjectorError;
use crate::injector::resolver::Resolver;

/// Identity of a dependency type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A constructor whose parameter types are its dependencies and whose return
/// type is the dependency it provides.
///
/// Implemented for every `Fn(A1, ..., An) -> O` with up to eight parameters.
/// `Args` is the parameter tuple and only serves to keep the impls apart.
pub trait Builder<Args>: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Parameter types, in call order.
    fn dependencies(&self) -> Vec<TypeInfo>;

    /// Resolves every parameter left to right, then calls the builder.
    fn build(&self, resolver: &mut Resolver<'_>) -> Result<Self::Output, InjectorError>;
}

macro_rules! impl_builder {
    ( $($ty:ident),* ) => {
        impl<F, O, $($ty,)*> Builder<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> O + Send + Sync + 'static,
            O: Send + 'static,
            $( $ty: Send + 'static, )*
        {
            type Output = O;

            fn dependencies(&self) -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$ty>()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn build(&self, resolver: &mut Resolver<'_>) -> Result<O, InjectorError> {
                $( let $ty = resolver.resolve::<$ty>()?; )*
                Ok(self($($ty),*))
            }
        }
    };
}

impl_builder!();
impl_builder!(T1);
impl_builder!(T1, T2);
impl_builder!(T1, T2, T3);
impl_builder!(T1, T2, T3, T4);
impl_builder!(T1, T2, T3, T4, T5);
impl_builder!(T1, T2, T3, T4, T5, T6);
impl_builder!(T1, T2, T3, T4, T5, T6, T7);
impl_builder!(T1, T2, T3, T4, T5, T6, T7, T8);
