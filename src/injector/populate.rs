use crate::error::InjectorError;
use crate::injector::builder::TypeInfo;
use crate::injector::resolver::Resolver;

type Assign<'a> = Box<dyn FnOnce(&mut Resolver<'_>) -> Result<(), InjectorError> + 'a>;

/// A settable field of a [`Populate`] target.
pub struct Slot<'a> {
    target: TypeInfo,
    assign: Assign<'a>,
}

impl<'a> Slot<'a> {
    /// A slot that overwrites `field` with a freshly resolved `T`.
    pub fn new<T: 'static>(field: &'a mut T) -> Self {
        Self {
            target: TypeInfo::of::<T>(),
            assign: Box::new(move |resolver: &mut Resolver<'_>| {
                *field = resolver.resolve::<T>()?;
                Ok(())
            }),
        }
    }

    pub fn target(&self) -> TypeInfo {
        self.target
    }

    pub(crate) fn fill(self, resolver: &mut Resolver<'_>) -> Result<(), InjectorError> {
        (self.assign)(resolver)
    }
}

/// A struct whose fields can be filled by an
/// [`Injector`](crate::injector::Injector).
///
/// Implement it with the [`populate!`](crate::populate) macro.
pub trait Populate {
    /// The injectable fields, in declaration order.
    fn slots(&mut self) -> Vec<Slot<'_>>;
}

/// Implements [`Populate`] for a struct, listing its injectable fields.
///
/// ```ignore
/// struct Services { sessions: Arc<SessionManager>, csrf: Arc<Csrf> }
/// owl::populate!(Services { sessions, csrf });
/// ```
#[macro_export]
macro_rules! populate {
    ($target:ty { $($field:ident),* $(,)? }) => {
        impl $crate::injector::Populate for $target {
            fn slots(&mut self) -> Vec<$crate::injector::Slot<'_>> {
                vec![$($crate::injector::Slot::new(&mut self.$field)),*]
            }
        }
    };
}
